//! PMX (or PMD) file to host scene, regenerating the sidecar on the way.

use crate::config::Options;
use crate::error::{Diagnostic, Error, Report, Result};
use crate::reader::load_model;
use crate::scene::{
    add, flip_uv, to_host_normal, to_host_space, Constraint, HostBone, HostMaterial, HostMesh,
    HostTriangle, HostVertex, IkAxis, SceneDescription, SceneWriter, ShapeKey,
};
use crate::sidecar::{write_sidecar, BusinessNames, Sidecar};
use crate::types::{Bone, BoneTail, Inherit, Model, MorphOffsets, SphereMode, Vec3};
use crate::validator::{ensure_unique, validate, validate_sidecar};
use std::collections::HashSet;
use std::f32::consts::PI;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Loads `path`, rewrites its sidecar and hands the scene to `writer`.
///
/// Nothing is written and the host is left untouched when a name collides.
pub fn import_model<W, P>(path: P, writer: &mut W, options: &Options) -> Result<Report>
where
    W: SceneWriter + ?Sized,
    P: AsRef<Path>,
{
    let started = Instant::now();
    let path = path.as_ref();
    let use_japanese = options.use_japanese_name;
    let model = load_model(path)?;
    ensure_unique(validate(&model, use_japanese))?;

    let names = BusinessNames::derive(&model, use_japanese);
    let sidecar = Sidecar::from_model(&model, &names);
    ensure_unique(validate_sidecar(&sidecar))?;

    let mut report = Report::default();
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let scene = build_scene(&model, &names, base, &mut report)?;
    if options.write_sidecar {
        write_sidecar(&path.with_extension("xml"), &sidecar, options.backups())?;
    }
    let vertices = model.vertices.len();
    writer.write_scene(scene)?;
    info!(
        file = %path.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        vertices,
        "imported model"
    );
    Ok(report)
}

/// A synthesized chain end: hidden, inert and pointing nowhere.
pub fn is_tip(bone: &Bone) -> bool {
    let dangling = match bone.tail {
        BoneTail::Bone(c) => c <= 0,
        BoneTail::Offset(o) => o == [0.0; 3],
    };
    dangling && !bone.visible && bone.ik.is_none() && bone.inherit == Inherit::None
}

/// Host bone name for each model bone; a tip stands in for its nearest real ancestor.
fn host_names(model: &Model, names: &BusinessNames) -> Vec<Option<String>> {
    let tips: Vec<bool> = model.bones.iter().map(is_tip).collect();
    (0..model.bones.len())
        .map(|mut i| {
            for _ in 0..model.bones.len() {
                if !tips[i] {
                    return names.bones.get(i).cloned();
                }
                i = usize::try_from(model.bones[i].parent)
                    .ok()
                    .filter(|p| *p < model.bones.len())?;
            }
            None
        })
        .collect()
}

fn lookup(hosts: &[Option<String>], index: i32) -> Option<String> {
    usize::try_from(index)
        .ok()
        .and_then(|i| hosts.get(i))
        .cloned()
        .flatten()
}

/// Model clamp back to host axes; the model y axis is host z.
fn ik_axes(limit: Option<(Vec3, Vec3)>) -> [IkAxis; 3] {
    let (lower, upper) = match limit {
        Some(limit) => limit,
        None => return [IkAxis::Free; 3],
    };
    let axis = |i: usize| {
        let (min, max) = (lower[i], upper[i]);
        if min == 0.0 && max == 0.0 {
            IkAxis::Locked
        } else if min <= -PI && max >= PI {
            IkAxis::Free
        } else {
            IkAxis::Limited { min, max }
        }
    };
    [axis(0), axis(2), axis(1)]
}

fn build_bones(model: &Model, hosts: &[Option<String>]) -> Vec<HostBone> {
    let mut out: Vec<(usize, HostBone)> = vec![];
    for (i, bone) in model.bones.iter().enumerate() {
        if is_tip(bone) {
            continue;
        }
        let name = match &hosts[i] {
            Some(name) => name.clone(),
            None => continue,
        };
        let head = to_host_space(bone.position);
        let tail = match bone.tail {
            BoneTail::Bone(c) => usize::try_from(c)
                .ok()
                .and_then(|c| model.bones.get(c))
                .map(|child| to_host_space(child.position)),
            BoneTail::Offset(o) if o != [0.0; 3] => Some(to_host_space(add(bone.position, o))),
            BoneTail::Offset(_) => None,
        };
        let tail = match tail {
            Some(t) if t != head => t,
            _ => to_host_space(add(bone.position, [0.0, 1.0, 0.0])),
        };
        let parent = model
            .bones
            .get(usize::try_from(bone.parent).unwrap_or(usize::MAX));
        let mut host = HostBone {
            parent: lookup(hosts, bone.parent),
            use_connect: parent.map_or(false, |p| p.tail == BoneTail::Bone(i as i32)),
            lock_rotation: [!bone.rotatable; 3],
            lock_location: [!bone.movable; 3],
            ..HostBone::new(name, head, tail)
        };
        if let Some((source, power)) = bone.inherit.source() {
            match lookup(hosts, source) {
                Some(subtarget) => {
                    let (influence, inverted) = (power.abs(), power < 0.0);
                    if bone.inherit.translates() {
                        host.constraints.push(Constraint::CopyLocation {
                            subtarget: subtarget.clone(),
                            influence,
                            inverted,
                        });
                    }
                    if bone.inherit.rotates() {
                        host.constraints.push(Constraint::CopyRotation {
                            subtarget,
                            influence,
                            inverted,
                        });
                    }
                }
                None => warn!(bone = %host.name, source, "inherit source has no host bone"),
            }
        }
        if bone.fixed_axis.is_some() {
            host.constraints
                .push(Constraint::LimitRotation { x: true, z: true });
        }
        if let Some(ik) = &bone.ik {
            host.ik_loops = Some(ik.loops);
            host.ik_limit = Some(ik.limit);
        }
        out.push((i, host));
    }

    // IK lives on the first link, pointing back at the controller
    for (i, bone) in model.bones.iter().enumerate() {
        let ik = match &bone.ik {
            Some(ik) => ik,
            None => continue,
        };
        let controller = match &hosts[i] {
            Some(name) => name.clone(),
            None => continue,
        };
        for (n, link) in ik.links.iter().enumerate() {
            let target = out.iter_mut().find(|(j, _)| *j as i32 == link.bone);
            match target {
                Some((_, host)) => {
                    host.ik_axes = ik_axes(link.limit);
                    if n == 0 {
                        host.constraints.push(Constraint::Ik {
                            subtarget: controller.clone(),
                            chain_count: ik.links.len() as u32,
                        });
                    }
                }
                None => warn!(%controller, link = link.bone, "IK link has no host bone"),
            }
        }
    }
    out.into_iter().map(|(_, host)| host).collect()
}

/// Texture path next to the model, or `None` with a diagnostic once per missing file.
fn texture(
    model: &Model,
    index: i32,
    base: &Path,
    missing: &mut HashSet<String>,
    report: &mut Report,
) -> Option<String> {
    let path = usize::try_from(index)
        .ok()
        .and_then(|i| model.textures.get(i))?;
    if base.join(path.replace('\\', "/")).exists() {
        return Some(path.clone());
    }
    if missing.insert(path.clone()) {
        report.push(Diagnostic::MissingResource { path: path.clone() });
    }
    None
}

fn build_materials(
    model: &Model,
    names: &BusinessNames,
    base: &Path,
    report: &mut Report,
) -> Vec<HostMaterial> {
    let mut missing = HashSet::new();
    model
        .materials
        .iter()
        .zip(&names.materials)
        .map(|(m, name)| HostMaterial {
            diffuse: m.diffuse,
            specular: m.specular,
            specular_power: m.specular_power,
            ambient: Some(m.ambient),
            texture: texture(model, m.texture, base, &mut missing, report),
            sphere: match m.sphere_mode {
                SphereMode::None => None,
                mode => texture(model, m.sphere, base, &mut missing, report).map(|p| (p, mode)),
            },
            ..HostMaterial::new(name.as_str())
        })
        .collect()
}

fn vertex_groups(influences: Vec<(i32, f32)>, hosts: &[Option<String>]) -> Vec<(String, f32)> {
    let mut groups: Vec<(String, f32)> = vec![];
    for (bone, weight) in influences {
        let name = match lookup(hosts, bone) {
            Some(name) => name,
            None => continue,
        };
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, w)) => *w += weight,
            None => groups.push((name, weight)),
        }
    }
    groups
}

fn build_mesh(
    model: &Model,
    names: &BusinessNames,
    hosts: &[Option<String>],
) -> Result<HostMesh> {
    let vertices: Vec<HostVertex> = model
        .vertices
        .iter()
        .map(|v| HostVertex {
            position: to_host_space(v.position),
            normal: to_host_normal(v.normal),
            groups: vertex_groups(v.weight.influences(), hosts),
        })
        .collect();

    let corner = |index: i32| -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < model.vertices.len())
            .ok_or_else(|| {
                Error::malformed(format!(
                    "face references vertex {} of {}",
                    index,
                    model.vertices.len()
                ))
            })
    };
    let mut triangles = Vec::with_capacity(model.faces.len() / 3);
    let mut faces = model.faces.chunks_exact(3);
    for (slot, material) in model.materials.iter().enumerate() {
        for _ in 0..material.face_count.max(0) / 3 {
            let face = match faces.next() {
                Some(face) => face,
                None => break,
            };
            let corners = [corner(face[0])?, corner(face[2])?, corner(face[1])?];
            triangles.push(HostTriangle {
                corners,
                uvs: corners.map(|c| flip_uv(model.vertices[c].uv)),
                material: slot,
            });
        }
    }
    if faces.len() > 0 {
        warn!(faces = faces.len(), "faces past the last material dropped");
    }

    let mut shape_keys = vec![];
    for (morph, name) in model.morphs.iter().zip(&names.morphs) {
        let offsets = match &morph.offsets {
            MorphOffsets::Vertex(offsets) => offsets,
            _ => continue,
        };
        let mut positions: Vec<Vec3> = vertices.iter().map(|v| v.position).collect();
        for o in offsets {
            match usize::try_from(o.vertex)
                .ok()
                .and_then(|i| positions.get_mut(i))
            {
                Some(p) => *p = add(*p, to_host_space(o.offset)),
                None => warn!(morph = %name, vertex = o.vertex, "offset past the last vertex"),
            }
        }
        shape_keys.push(ShapeKey {
            name: name.clone(),
            positions,
        });
    }

    Ok(HostMesh {
        name: model.info.name.clone(),
        vertices,
        triangles,
        materials: names.materials.clone(),
        shape_keys,
        mirrored: false,
    })
}

fn build_scene(
    model: &Model,
    names: &BusinessNames,
    base: &Path,
    report: &mut Report,
) -> Result<SceneDescription> {
    let hosts = host_names(model, names);
    let bones = build_bones(model, &hosts);
    let mesh = build_mesh(model, names, &hosts)?;
    let materials = build_materials(model, names, base, report);
    debug!(
        bones = bones.len(),
        triangles = mesh.triangles.len(),
        shape_keys = mesh.shape_keys.len(),
        "built scene"
    );
    Ok(SceneDescription {
        name: model.info.name.clone(),
        bones,
        meshes: vec![mesh],
        materials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{export_model, tests::leg_scene};
    use crate::types::Encode;
    use crate::writer::save_model;
    use std::fs;

    #[derive(Default)]
    struct Capture(Option<SceneDescription>);

    impl SceneWriter for Capture {
        fn write_scene(&mut self, scene: SceneDescription) -> Result<()> {
            self.0 = Some(scene);
            Ok(())
        }
    }

    fn round_trip(options: &Options) -> (SceneDescription, Report, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pmx");
        export_model(&leg_scene(), &path, options).unwrap();
        let mut capture = Capture::default();
        let report = import_model(&path, &mut capture, options).unwrap();
        (capture.0.unwrap(), report, dir)
    }

    #[test]
    fn exported_skeleton_comes_back() {
        let (scene, _, _dir) = round_trip(&Options::default());
        let original = leg_scene();
        let names: Vec<&str> = scene.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["center", "leg_L", "knee_L", "leg IK_L"]);

        let knee = scene.bone("knee_L").unwrap();
        let source = original.bone("knee_L").unwrap();
        assert_eq!(knee.head, source.head);
        assert_eq!(knee.tail, source.tail);
        assert_eq!(knee.parent.as_deref(), Some("leg_L"));
        assert!(knee.use_connect);
        assert_eq!(knee.ik_axes, source.ik_axes);
        assert_eq!(
            knee.constraints,
            vec![Constraint::Ik {
                subtarget: "leg IK_L".to_owned(),
                chain_count: 2
            }]
        );
        assert_eq!(scene.bone("leg IK_L").unwrap().ik_loops, Some(40));
        assert!(!scene.bone("leg_L").unwrap().use_connect);
    }

    #[test]
    fn exported_mesh_comes_back() {
        let (scene, report, _dir) = round_trip(&Options::default());
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::MissingResource {
                path: "tex/body.png".to_owned()
            }]
        );
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertices.len(), 5);
        assert_eq!(mesh.triangles[0].corners, [0, 1, 2]);
        assert_eq!(mesh.triangles[0].uvs, [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
        assert_eq!(mesh.triangles[1].corners, [0, 4, 3]);
        assert_eq!(
            mesh.vertices[1].groups,
            vec![("leg_L".to_owned(), 0.25), ("knee_L".to_owned(), 0.75)]
        );
        assert_eq!(mesh.materials, vec!["body"]);
        assert_eq!(scene.materials[0].texture, None);

        let key = &mesh.shape_keys[0];
        assert_eq!(key.name, "あ");
        assert_eq!(key.positions[2], [1.0, 0.0, 2.0]);
        assert_eq!(key.positions[4], [1.0, 0.0, 2.0]);
        assert_eq!(key.positions[1], mesh.vertices[1].position);
    }

    #[test]
    fn present_textures_are_bound_and_the_sidecar_is_backed_up() {
        let options = Options::builder().save_versions(2).build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pmx");
        fs::create_dir(dir.path().join("tex")).unwrap();
        fs::write(dir.path().join("tex").join("body.png"), b"png").unwrap();
        export_model(&leg_scene(), &path, &options).unwrap();

        let mut capture = Capture::default();
        let report = import_model(&path, &mut capture, &options).unwrap();
        assert!(report.is_empty(), "{}", report);
        let scene = capture.0.unwrap();
        assert_eq!(scene.materials[0].texture.as_deref(), Some("tex/body.png"));
        assert!(dir.path().join("model1.xml").exists());

        let sidecar = Sidecar::load(dir.path().join("model.xml")).unwrap().unwrap();
        let b_names: Vec<&str> = sidecar.bones.iter().map(|b| b.b_name.as_str()).collect();
        assert_eq!(b_names, vec!["center", "leg_L", "knee_L", "knee先_L", "leg IK_L"]);
    }

    #[test]
    fn tips_hand_their_weights_to_the_parent() {
        let model = Model {
            bones: vec![
                Bone {
                    name: "arm".to_owned(),
                    tail: BoneTail::Bone(1),
                    ..Bone::default()
                },
                Bone {
                    name: "arm先".to_owned(),
                    parent: 0,
                    visible: false,
                    ..Bone::default()
                },
            ],
            ..Model::default()
        };
        assert!(!is_tip(&model.bones[0]));
        assert!(is_tip(&model.bones[1]));
        let names = BusinessNames::derive(&model, true);
        let hosts = host_names(&model, &names);
        assert_eq!(hosts, vec![Some("arm".to_owned()), Some("arm".to_owned())]);
        assert_eq!(
            vertex_groups(vec![(0, 0.5), (1, 0.5)], &hosts),
            vec![("arm".to_owned(), 1.0)]
        );
        let bones = build_bones(&model, &hosts);
        assert_eq!(bones.len(), 1);
    }

    #[test]
    fn inherit_becomes_copy_constraints() {
        let model = Model {
            bones: vec![
                Bone {
                    name: "shoulder".to_owned(),
                    ..Bone::default()
                },
                Bone {
                    name: "twist".to_owned(),
                    inherit: Inherit::Both {
                        parent: 0,
                        power: -0.5,
                    },
                    fixed_axis: Some([1.0, 0.0, 0.0]),
                    ..Bone::default()
                },
            ],
            ..Model::default()
        };
        let hosts = host_names(&model, &BusinessNames::derive(&model, true));
        let bones = build_bones(&model, &hosts);
        assert_eq!(
            bones[1].constraints,
            vec![
                Constraint::CopyLocation {
                    subtarget: "shoulder".to_owned(),
                    influence: 0.5,
                    inverted: true
                },
                Constraint::CopyRotation {
                    subtarget: "shoulder".to_owned(),
                    influence: 0.5,
                    inverted: true
                },
                Constraint::LimitRotation { x: true, z: true },
            ]
        );
        assert_eq!(bones[0].lock_location, [true; 3]);
    }

    #[test]
    fn collisions_leave_the_host_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.pmx");
        let bone = |name: &str| Bone {
            name: name.to_owned(),
            ..Bone::default()
        };
        let model = Model {
            bones: vec![bone("腕"), bone("腕")],
            ..Model::default()
        };
        save_model(&path, &model, Encode::Utf8).unwrap();
        let mut capture = Capture::default();
        let err = import_model(&path, &mut capture, &Options::default()).unwrap_err();
        assert!(matches!(err, Error::NameCollision(_)));
        assert!(capture.0.is_none());
        assert!(!dir.path().join("dup.xml").exists());
    }
}
