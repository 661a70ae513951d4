//! Host scene to PMX file, reconciled with the sidecar next to it.

use crate::bone_order::{build_bone_order, default_bone_name, tip_names, BoneIndex, BoneOrder, BoneSlot};
use crate::config::Options;
use crate::error::{Diagnostic, Error, Report, Result};
use crate::scene::{
    flip_uv, normalize, sub, to_model_normal, to_model_space, Constraint, HostBone, HostMaterial,
    HostMesh, IkAxis, SceneDescription, SceneReader,
};
use crate::sidecar::{
    apply_material, resolve_joints, resolve_labels, resolve_morphs, resolve_rigids,
    write_sidecar, BoneRecord, BusinessNames, Sidecar, Sources,
};
use crate::types::{
    Bone, BoneTail, Ik, IkLink, Inherit, LocalAxis, Material, MaterialFlags, Model, SphereMode,
    TextureTable, ToonMode, Vec3, Vertex, VertexOffset, VertexWeight,
};
use crate::validator::{ensure_unique, validate, validate_sidecar};
use crate::writer::save_model;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Writes `scene` to `path` and, when enabled, rewrites the sidecar beside it.
///
/// Both the model and the sidecar are validated before anything touches the disk.
/// Non-fatal problems are collected in the returned report.
pub fn export_model<S, P>(scene: &S, path: P, options: &Options) -> Result<Report>
where
    S: SceneReader + ?Sized,
    P: AsRef<Path>,
{
    let started = Instant::now();
    let path = path.as_ref();
    let scene = scene.read_scene()?;
    let use_japanese = options.use_japanese_name;
    let sidecar_path = path.with_extension("xml");
    let sources = Sources::new(Sidecar::load(&sidecar_path)?, use_japanese)?;
    ensure_unique(validate_sidecar(&sources.active))?;

    let mut report = Report::default();
    let xml_order = sources.bone_order();
    let order = build_bone_order(&scene.bones, xml_order.as_deref(), use_japanese);
    let mut bones = build_bones(&scene, &order, &sources, use_japanese);
    if bones.is_empty() {
        bones.push(Bone::default());
    }

    let (mut materials, material_names, textures) = build_materials(&scene, &sources, &mut report);
    let geometry = build_geometry(&scene.meshes, &material_names, &order.index, &mut report)?;
    let mut faces = Vec::with_capacity(geometry.faces.iter().map(Vec::len).sum());
    for (material, run) in materials.iter_mut().zip(&geometry.faces) {
        material.face_count = run.len() as i32;
        faces.extend_from_slice(run);
    }

    let material_index: HashMap<String, i32> = material_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i as i32))
        .collect();
    let (morphs, morph_names) = resolve_morphs(
        &sources,
        geometry.morphs,
        &material_index,
        &order.index,
        &mut report,
    );
    let morph_index: HashMap<String, i32> = morph_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i as i32))
        .collect();
    let frames = resolve_labels(
        sources.active.labels.as_deref(),
        &order.index,
        bones.len(),
        &morph_index,
        morphs.len(),
        &mut report,
    );
    let rigids = resolve_rigids(&sources.active.rigids, &order.index, &mut report);
    let joints = resolve_joints(&sources.active.joints, &rigids, &mut report);

    let file_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let model = Model {
        info: sources.model_info(&file_name),
        vertices: geometry.vertices,
        faces,
        textures: textures.paths,
        materials,
        bones,
        morphs,
        frames,
        rigids,
        joints,
        ..Model::default()
    };
    ensure_unique(validate(&model, use_japanese))?;

    save_model(path, &model, options.encoding)?;
    if options.write_sidecar {
        let names = BusinessNames {
            bones: order
                .slots
                .iter()
                .map(|slot| slot.business_name(use_japanese))
                .collect(),
            materials: material_names,
            morphs: morph_names,
        };
        write_sidecar(
            &sidecar_path,
            &Sidecar::from_model(&model, &names),
            options.backups(),
        )?;
    }
    info!(
        file = %path.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        vertices = model.vertices.len(),
        "exported model"
    );
    Ok(report)
}

fn build_bones(
    scene: &SceneDescription,
    order: &BoneOrder,
    sources: &Sources,
    use_japanese: bool,
) -> Vec<Bone> {
    let index = &order.index;
    let mut bones = Vec::with_capacity(order.slots.len());
    let mut ik_stack: Vec<(String, Ik)> = vec![];
    for slot in &order.slots {
        let record = sources.active.bone(&slot.business_name(use_japanese));
        let bone = match slot {
            BoneSlot::Tip { controller } => tip_bone(scene, controller, record, index),
            BoneSlot::Real { name } => match scene.bone(name) {
                Some(host) => real_bone(scene, host, record, index, &mut ik_stack),
                None => Bone {
                    name: name.clone(),
                    name_en: name.clone(),
                    ..Bone::default()
                },
            },
        };
        bones.push(bone);
    }
    for (controller, ik) in ik_stack {
        match usize::try_from(index.get(&controller))
            .ok()
            .and_then(|i| bones.get_mut(i))
        {
            Some(bone) => bone.ik = Some(ik),
            None => warn!(%controller, "IK controller has no bone slot"),
        }
    }
    debug!(bones = bones.len(), "built skeleton");
    bones
}

/// Terminal bone at the controller's tail. A sidecar record only renames it.
fn tip_bone(
    scene: &SceneDescription,
    controller: &str,
    record: Option<&BoneRecord>,
    index: &BoneIndex,
) -> Bone {
    let names = tip_names(controller);
    let mut bone = Bone {
        name: names.jp,
        name_en: names.en,
        position: scene
            .bone(controller)
            .map_or([0.0; 3], |host| to_model_space(host.tail)),
        parent: index.get(controller),
        tail: BoneTail::Bone(-1),
        rotatable: false,
        movable: false,
        visible: false,
        operational: false,
        ..Bone::default()
    };
    if let Some(record) = record {
        if let Some(name) = &record.name {
            bone.name = name.clone();
        }
        if let Some(name_e) = &record.name_e {
            bone.name_en = name_e.clone();
        }
        bone.level = record.level;
    }
    bone
}

fn local_axis(x: Vec3, z: Vec3, direction: Vec3) -> LocalAxis {
    if x == [0.0; 3] && z == [0.0; 3] {
        LocalAxis {
            x: normalize(direction),
            z: [0.0, 0.0, -1.0],
        }
    } else {
        LocalAxis { x, z }
    }
}

fn real_bone(
    scene: &SceneDescription,
    host: &HostBone,
    record: Option<&BoneRecord>,
    index: &BoneIndex,
    ik_stack: &mut Vec<(String, Ik)>,
) -> Bone {
    let head = to_model_space(host.head);
    let direction = sub(to_model_space(host.tail), head);
    let mut bone = match record {
        Some(r) => {
            let name = r.name.clone().unwrap_or_else(|| r.b_name.clone());
            Bone {
                name_en: r.name_e.clone().unwrap_or_else(|| name.clone()),
                name,
                level: r.level,
                rotatable: r.rotatable,
                movable: r.movable,
                visible: r.visible,
                operational: r.operational,
                inherit: Inherit::from_parts(
                    r.add_rot,
                    r.add_move,
                    r.target.as_deref().map_or(-1, |t| index.get(t)),
                    r.power,
                ),
                fixed_axis: if r.fixed_axis {
                    Some(normalize(direction))
                } else {
                    None
                },
                local_axis: if r.local_axis {
                    Some(local_axis(r.local_x, r.local_z, direction))
                } else {
                    None
                },
                after_physics: r.after_physical,
                ..Bone::default()
            }
        }
        None => Bone {
            name: default_bone_name(&host.name),
            name_en: host.name.clone(),
            rotatable: true,
            movable: true,
            ..Bone::default()
        },
    };
    bone.position = head;
    bone.parent = host.parent.as_deref().map_or(-1, |p| index.get(p));

    let child = scene
        .bones
        .iter()
        .find(|b| b.use_connect && b.parent.as_deref() == Some(host.name.as_str()));
    bone.tail = match child {
        Some(c) => BoneTail::Bone(index.get(&c.name)),
        None => BoneTail::Offset(direction),
    };
    if host.lock_rotation.iter().all(|locked| *locked) {
        bone.rotatable = false;
    }
    if host.lock_location.iter().all(|locked| *locked) {
        bone.movable = false;
    }

    for constraint in &host.constraints {
        match constraint {
            Constraint::CopyLocation {
                subtarget,
                influence,
                inverted,
            } => {
                let power = if *inverted { -influence } else { *influence };
                bone.inherit =
                    Inherit::from_parts(bone.inherit.rotates(), true, index.get(subtarget), power);
            }
            Constraint::CopyRotation {
                subtarget,
                influence,
                inverted,
            } => {
                let power = if *inverted { -influence } else { *influence };
                bone.inherit = Inherit::from_parts(
                    true,
                    bone.inherit.translates(),
                    index.get(subtarget),
                    power,
                );
            }
            Constraint::LimitRotation { x, z } => {
                if *x && *z {
                    bone.fixed_axis = Some(normalize(direction));
                }
            }
            Constraint::Ik {
                subtarget,
                chain_count,
            } => {
                if child.is_none() {
                    bone.tail = BoneTail::Bone(index.get(&BoneSlot::Tip {
                        controller: host.name.clone(),
                    }
                    .key()));
                }
                let target = match bone.tail {
                    BoneTail::Bone(i) => i,
                    BoneTail::Offset(_) => -1,
                };
                let controller = scene.bone(subtarget);
                ik_stack.push((
                    subtarget.clone(),
                    Ik {
                        target,
                        loops: controller.and_then(|c| c.ik_loops).unwrap_or(10),
                        limit: controller.and_then(|c| c.ik_limit).unwrap_or(2.0),
                        links: ik_chain(scene, host, *chain_count, index),
                    },
                ));
            }
        }
    }
    bone
}

/// Walks `count` bones up from the chain end; 0 walks to the root.
fn ik_chain(scene: &SceneDescription, end: &HostBone, count: u32, index: &BoneIndex) -> Vec<IkLink> {
    let count = if count == 0 { usize::MAX } else { count as usize };
    let mut links = vec![];
    let mut cursor = Some(end);
    while let Some(bone) = cursor {
        if links.len() == count || links.len() == scene.bones.len() {
            break;
        }
        links.push(IkLink {
            bone: index.get(&bone.name),
            limit: ik_limit(&bone.ik_axes),
        });
        cursor = bone.parent.as_deref().and_then(|p| scene.bone(p));
    }
    links
}

/// Host x, y, z freedom as a model clamp; host y is the model z axis.
fn ik_limit(axes: &[IkAxis; 3]) -> Option<(Vec3, Vec3)> {
    if axes.iter().all(|a| *a == IkAxis::Free) {
        return None;
    }
    let range = |axis: IkAxis| match axis {
        IkAxis::Free => (-PI, PI),
        IkAxis::Locked => (0.0, 0.0),
        IkAxis::Limited { min, max } => (min, max),
    };
    let (x, y, z) = (range(axes[0]), range(axes[1]), range(axes[2]));
    Some(([x.0, z.0, y.0], [x.1, z.1, y.1]))
}

fn host_material(host: &HostMaterial, textures: &mut TextureTable) -> Material {
    let [r, g, b, _] = host.diffuse;
    let (sphere, sphere_mode) = match &host.sphere {
        Some((path, mode)) if *mode != SphereMode::None => (textures.intern(path), *mode),
        _ => (-1, SphereMode::None),
    };
    Material {
        name: host.name.clone(),
        name_en: host.name.clone(),
        diffuse: host.diffuse,
        specular: host.specular,
        specular_power: host.specular_power,
        ambient: host.ambient.unwrap_or([r * 0.4, g * 0.4, b * 0.4]),
        flags: MaterialFlags::GROUND_SHADOW
            | MaterialFlags::DROP_SHADOW
            | MaterialFlags::RECEIVE_SHADOW
            | MaterialFlags::EDGE,
        texture: host.texture.as_deref().map_or(-1, |p| textures.intern(p)),
        sphere,
        sphere_mode,
        toon: ToonMode::System(0),
        ..Material::default()
    }
}

/// Materials used by some mesh: sidecar order first, then the rest by name.
fn build_materials(
    scene: &SceneDescription,
    sources: &Sources,
    report: &mut Report,
) -> (Vec<Material>, Vec<String>, TextureTable) {
    let mut used: Vec<&str> = vec![];
    for name in scene.meshes.iter().flat_map(|m| &m.materials) {
        if !used.contains(&name.as_str()) {
            used.push(name);
        }
    }
    let mut names: Vec<String> = vec![];
    for record in &sources.active.materials {
        if used.contains(&record.b_name.as_str()) && !names.contains(&record.b_name) {
            names.push(record.b_name.clone());
        }
    }
    let mut rest: Vec<String> = used
        .iter()
        .filter(|n| !names.iter().any(|m| m == *n))
        .map(|n| n.to_string())
        .collect();
    rest.sort();
    names.extend(rest);

    let mut textures = TextureTable::default();
    let mut materials = Vec::with_capacity(names.len());
    for name in &names {
        let host = match scene.material(name) {
            Some(host) => host.clone(),
            None => {
                report.push(Diagnostic::UnresolvedName {
                    kind: "material",
                    name: name.clone(),
                });
                HostMaterial::new(name.as_str())
            }
        };
        let mut material = host_material(&host, &mut textures);
        if let Some(record) = sources.active.material(name) {
            apply_material(record, &mut material, &mut textures);
        }
        materials.push(material);
    }
    (materials, names, textures)
}

struct Geometry {
    vertices: Vec<Vertex>,
    /// Face indices per material, in material order.
    faces: Vec<Vec<i32>>,
    /// Shape key name and offsets, in first-seen order.
    morphs: Vec<(String, Vec<VertexOffset>)>,
}

fn build_geometry(
    meshes: &[HostMesh],
    materials: &[String],
    bones: &BoneIndex,
    report: &mut Report,
) -> Result<Geometry> {
    let slots: HashMap<&str, usize> = materials
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    let mut g = Geometry {
        vertices: vec![],
        faces: vec![vec![]; materials.len()],
        morphs: vec![],
    };

    for mesh in meshes {
        if mesh.materials.is_empty() {
            report.push(Diagnostic::MeshWithoutMaterial {
                mesh: mesh.name.clone(),
            });
            continue;
        }
        let base = g.vertices.len();
        for v in &mesh.vertices {
            let influences: Vec<(i32, f32)> = v
                .groups
                .iter()
                .filter_map(|(group, weight)| {
                    let bone = bones.get(group);
                    if bone < 0 {
                        None
                    } else {
                        Some((bone, *weight))
                    }
                })
                .collect();
            g.vertices.push(Vertex {
                position: to_model_space(v.position),
                normal: to_model_normal(v.normal),
                weight: VertexWeight::from_influences(&influences),
                ..Vertex::default()
            });
        }

        // a vertex seen with a second UV is copied; morphs follow the copies
        let mut has_uv = vec![false; mesh.vertices.len()];
        let mut by_uv: HashMap<(usize, [u32; 2]), i32> = HashMap::new();
        let mut copies: HashMap<usize, Vec<i32>> = HashMap::new();
        for triangle in &mesh.triangles {
            let material = match mesh
                .materials
                .get(triangle.material)
                .and_then(|name| slots.get(name.as_str()))
            {
                Some(&m) => m,
                None => {
                    warn!(mesh = %mesh.name, slot = triangle.material, "triangle without material slot skipped");
                    continue;
                }
            };
            let mut corners = [0i32; 3];
            for (k, corner) in corners.iter_mut().enumerate() {
                let local = triangle.corners[k];
                if local >= mesh.vertices.len() {
                    return Err(Error::malformed(format!(
                        "mesh {} references vertex {} of {}",
                        mesh.name,
                        local,
                        mesh.vertices.len()
                    )));
                }
                let uv = flip_uv(triangle.uvs[k]);
                let key = (local, [uv[0].to_bits(), uv[1].to_bits()]);
                *corner = match by_uv.get(&key) {
                    Some(&i) => i,
                    None => {
                        let i = if has_uv[local] {
                            let mut copy = g.vertices[base + local].clone();
                            copy.uv = uv;
                            g.vertices.push(copy);
                            let i = (g.vertices.len() - 1) as i32;
                            copies.entry(local).or_default().push(i);
                            i
                        } else {
                            has_uv[local] = true;
                            g.vertices[base + local].uv = uv;
                            (base + local) as i32
                        };
                        by_uv.insert(key, i);
                        i
                    }
                };
            }
            let winding = if mesh.mirrored { [0, 1, 2] } else { [0, 2, 1] };
            g.faces[material].extend(winding.iter().map(|&k| corners[k]));
        }

        for key in &mesh.shape_keys {
            if key.positions.len() != mesh.vertices.len() {
                report.push(Diagnostic::ShapeMismatch {
                    mesh: mesh.name.clone(),
                    shape: key.name.clone(),
                    expected: mesh.vertices.len(),
                    found: key.positions.len(),
                });
                continue;
            }
            let mut offsets = vec![];
            for (local, (v, moved)) in mesh.vertices.iter().zip(&key.positions).enumerate() {
                if v.position == *moved {
                    continue;
                }
                let offset = sub(to_model_space(*moved), to_model_space(v.position));
                offsets.push(VertexOffset {
                    vertex: (base + local) as i32,
                    offset,
                });
                for &copy in copies.get(&local).into_iter().flatten() {
                    offsets.push(VertexOffset {
                        vertex: copy,
                        offset,
                    });
                }
            }
            match g.morphs.iter_mut().find(|(name, _)| *name == key.name) {
                Some((_, existing)) => existing.extend(offsets),
                None => g.morphs.push((key.name.clone(), offsets)),
            }
        }
    }
    debug!(
        vertices = g.vertices.len(),
        shape_keys = g.morphs.len(),
        "built geometry"
    );
    Ok(g)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::reader::load_model;
    use crate::scene::{HostTriangle, HostVertex, ShapeKey};
    use crate::types::{FrameItem, MorphOffsets, Panel, RigidShape};
    use std::fs;

    fn vertex(position: Vec3, groups: &[(&str, f32)]) -> HostVertex {
        HostVertex {
            position,
            normal: [0.0, 0.0, 1.0],
            groups: groups.iter().map(|(n, w)| (n.to_string(), *w)).collect(),
        }
    }

    /// A leg with an IK chain and one split-UV quad.
    pub(crate) fn leg_scene() -> SceneDescription {
        let mut knee = HostBone {
            parent: Some("leg_L".to_owned()),
            use_connect: true,
            ik_axes: [
                IkAxis::Limited {
                    min: -1.0,
                    max: 0.0,
                },
                IkAxis::Locked,
                IkAxis::Free,
            ],
            ..HostBone::new("knee_L", [1.0, 0.0, 0.5], [1.0, 0.0, 0.0])
        };
        knee.constraints.push(Constraint::Ik {
            subtarget: "leg IK_L".to_owned(),
            chain_count: 2,
        });
        let bones = vec![
            HostBone::new("center", [0.0; 3], [0.0, 0.0, 1.0]),
            HostBone {
                parent: Some("center".to_owned()),
                ..HostBone::new("leg_L", [1.0, 0.0, 1.0], [1.0, 0.0, 0.5])
            },
            knee,
            HostBone {
                ik_loops: Some(40),
                ..HostBone::new("leg IK_L", [1.0, 0.0, 0.0], [1.0, 1.0, 0.0])
            },
        ];
        let mesh = HostMesh {
            name: "body".to_owned(),
            vertices: vec![
                vertex([0.0, 0.0, 0.0], &[("center", 1.0)]),
                vertex([1.0, 0.0, 0.0], &[("leg_L", 0.25), ("knee_L", 0.75)]),
                vertex([1.0, 0.0, 1.0], &[("center", 1.0), ("unknown", 1.0)]),
                vertex([0.0, 0.0, 1.0], &[]),
            ],
            triangles: vec![
                HostTriangle {
                    corners: [0, 1, 2],
                    uvs: [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
                    material: 0,
                },
                HostTriangle {
                    corners: [0, 2, 3],
                    uvs: [[0.0, 0.0], [0.5, 0.5], [0.0, 1.0]],
                    material: 0,
                },
            ],
            materials: vec!["body".to_owned()],
            shape_keys: vec![ShapeKey {
                name: "あ".to_owned(),
                positions: vec![
                    [0.0, 0.0, 0.0],
                    [1.0, 0.0, 0.0],
                    [1.0, 0.0, 2.0],
                    [0.0, 0.0, 1.0],
                ],
            }],
            mirrored: false,
        };
        SceneDescription {
            name: "leg".to_owned(),
            bones,
            meshes: vec![mesh],
            materials: vec![HostMaterial {
                diffuse: [1.0, 0.0, 0.0, 1.0],
                texture: Some("tex/body.png".to_owned()),
                ..HostMaterial::new("body")
            }],
        }
    }

    #[test]
    fn exports_skeleton_with_tip_and_ik() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pmx");
        let report = export_model(&leg_scene(), &path, &Options::default()).unwrap();
        assert!(report.is_empty(), "{}", report);

        let model = load_model(&path).unwrap();
        let names: Vec<&str> = model.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["center", "左leg", "左knee", "左knee先", "左leg IK"]);
        assert_eq!(model.bones[0].tail, BoneTail::Offset([0.0, 5.0, 0.0]));
        assert_eq!(model.bones[1].tail, BoneTail::Bone(2));
        assert_eq!(model.bones[2].tail, BoneTail::Bone(3));

        let tip = &model.bones[3];
        assert_eq!(tip.name_en, "knee tip_L");
        assert_eq!(tip.parent, 2);
        assert_eq!(tip.position, [5.0, 0.0, 0.0]);
        assert!(!tip.rotatable && !tip.movable && !tip.visible && !tip.operational);

        let ik = model.bones[4].ik.as_ref().unwrap();
        assert_eq!(ik.target, 3);
        assert_eq!(ik.loops, 40);
        assert_eq!(ik.limit, 2.0);
        assert_eq!(ik.links.len(), 2);
        assert_eq!(ik.links[0].bone, 2);
        assert_eq!(ik.links[0].limit, Some(([-1.0, -PI, 0.0], [0.0, PI, 0.0])));
        assert_eq!(ik.links[1].limit, None);
    }

    #[test]
    fn exports_split_vertices_and_morphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pmx");
        export_model(&leg_scene(), &path, &Options::default()).unwrap();
        let model = load_model(&path).unwrap();

        assert_eq!(model.vertices.len(), 5);
        assert_eq!(model.faces, vec![0, 2, 1, 0, 3, 4]);
        assert_eq!(model.vertices[2].uv, [1.0, 0.0]);
        assert_eq!(model.vertices[4].uv, [0.5, 0.5]);
        assert_eq!(model.vertices[4].position, model.vertices[2].position);
        assert_eq!(
            model.vertices[1].weight,
            VertexWeight::BDEF2 {
                bones: [1, 2],
                weight: 0.25
            }
        );
        assert_eq!(model.vertices[2].weight, VertexWeight::BDEF1(0));

        assert_eq!(model.morphs.len(), 1);
        let morph = &model.morphs[0];
        assert_eq!(morph.panel, Panel::Mouth);
        assert_eq!(morph.name_en, "A");
        assert_eq!(
            morph.offsets,
            MorphOffsets::Vertex(vec![
                VertexOffset {
                    vertex: 2,
                    offset: [0.0, 5.0, 0.0]
                },
                VertexOffset {
                    vertex: 4,
                    offset: [0.0, 5.0, 0.0]
                },
            ])
        );

        let material = &model.materials[0];
        assert_eq!(material.face_count, 6);
        assert_eq!(material.ambient, [0.4, 0.0, 0.0]);
        assert_eq!(material.toon, ToonMode::System(0));
        assert_eq!(model.textures, vec!["tex/body.png"]);

        assert_eq!(model.frames.len(), 3);
        assert_eq!(model.frames[1].items, vec![FrameItem::Morph(0)]);
        assert_eq!(model.frames[2].items.len(), 5);
        assert_eq!(model.info.name, "model");
    }

    #[test]
    fn sidecar_drives_order_names_and_physics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pmx");
        fs::write(
            dir.path().join("model.xml"),
            r#"<?xml version="1.0" encoding="utf-8"?>
<ns0:pmxstatus xmlns:ns0="local" xml:lang="jp">
<pmdinfo><name>脚</name><comment>line1
line2</comment></pmdinfo>
<bones>
<bone b_name="leg IK_L" name="左足ＩＫ" name_e="leg IK_L" rotatable="1" movable="1" visible="1" operational="1" />
<bone b_name="center" name="センター" name_e="center" rotatable="1" movable="1" visible="1" operational="1" />
<bone b_name="knee先_L" name="左ひざ先" level="2" />
</bones>
<materials><material b_name="body" name="体" edge_size="0.3" /></materials>
<rigid_bodies>
<rigid name="hip" attach="center" shape="1" type="0"><size a="1" b="2" c="3" /></rigid>
</rigid_bodies>
<constraints><constraint name="j" body_A="hip" body_B="hip" /></constraints>
</ns0:pmxstatus>
"#,
        )
        .unwrap();
        let options = Options::builder().save_versions(1).build();
        export_model(&leg_scene(), &path, &options).unwrap();
        let model = load_model(&path).unwrap();

        assert_eq!(model.info.name, "脚");
        assert_eq!(model.info.comment, "line1\r\nline2");
        assert_eq!(model.bones[0].name, "左足ＩＫ");
        assert_eq!(model.bones[1].name, "センター");
        let tip = model.bones.iter().find(|b| b.name == "左ひざ先").unwrap();
        assert_eq!(tip.level, 2);
        assert!(!tip.visible);

        let material = &model.materials[0];
        assert_eq!(material.name, "体");
        assert_eq!(material.edge_size, 0.3);
        assert_eq!(material.diffuse, [1.0, 0.0, 0.0, 1.0]);

        assert_eq!(model.rigids.len(), 1);
        assert_eq!(model.rigids[0].bone, 1);
        assert_eq!(model.rigids[0].shape, RigidShape::Box);
        assert_eq!((model.joints[0].rigid_a, model.joints[0].rigid_b), (0, 0));
        // the sidecar has no labels, so the default frames are used
        assert_eq!(model.frames[0].name, "Root");

        assert!(dir.path().join("model1.xml").exists());
        let rewritten = Sidecar::load(dir.path().join("model.xml")).unwrap().unwrap();
        assert_eq!(rewritten.bones[0].b_name, "leg IK_L");
        assert!(rewritten.bone("knee先_L").is_some());
        assert_eq!(rewritten.rigids[0].attach.as_deref(), Some("center"));
    }

    #[test]
    fn duplicate_names_abort_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pmx");
        fs::write(
            dir.path().join("model.xml"),
            r#"<pmxstatus><bones>
<bone b_name="center" name="同じ" /><bone b_name="leg_L" name="同じ" />
</bones></pmxstatus>"#,
        )
        .unwrap();
        let err = export_model(&leg_scene(), &path, &Options::default()).unwrap_err();
        assert!(matches!(err, Error::NameCollision(ref v) if v.len() == 1));
        assert!(!path.exists());
    }

    #[test]
    fn non_fatal_problems_are_reported() {
        let mut scene = leg_scene();
        scene.meshes[0].shape_keys.push(ShapeKey {
            name: "broken".to_owned(),
            positions: vec![[0.0; 3]],
        });
        scene.meshes.push(HostMesh {
            name: "bare".to_owned(),
            ..HostMesh::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pmx");
        let options = Options::builder().write_sidecar(false).build();
        let report = export_model(&scene, &path, &options).unwrap();
        assert_eq!(
            report.diagnostics,
            vec![
                Diagnostic::ShapeMismatch {
                    mesh: "body".to_owned(),
                    shape: "broken".to_owned(),
                    expected: 4,
                    found: 1,
                },
                Diagnostic::MeshWithoutMaterial {
                    mesh: "bare".to_owned()
                },
            ]
        );
        assert!(!dir.path().join("model.xml").exists());
    }

    #[test]
    fn empty_skeleton_gets_a_default_bone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pmx");
        export_model(&SceneDescription::default(), &path, &Options::default()).unwrap();
        let model = load_model(&path).unwrap();
        assert_eq!(model.bones.len(), 1);
        assert!(model.vertices.is_empty());
        assert!(model.materials.is_empty());
    }

    #[test]
    fn ik_limits_swap_host_axes() {
        assert_eq!(ik_limit(&[IkAxis::Free; 3]), None);
        let limit = ik_limit(&[
            IkAxis::Free,
            IkAxis::Limited {
                min: -0.5,
                max: 0.25,
            },
            IkAxis::Locked,
        ]);
        assert_eq!(limit, Some(([-PI, 0.0, -0.5], [PI, 0.0, 0.25])));
    }
}
