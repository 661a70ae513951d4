//! Sidecar records and their tolerant parser.
//!
//! Elements are matched by local tag name, so the `ns0:` prefix of the root and any
//! other namespace decoration is ignored. Missing attributes and children fall back
//! to defaults; numbers that do not parse are logged and treated as missing.

use crate::error::Result;
use crate::types::{MaterialOperation, Panel, SphereMode, Vec3, Vec4};
use roxmltree::{Document, Node};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    pub name: Option<String>,
    pub name_e: Option<String>,
    pub comment: Option<String>,
    pub comment_e: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoneRecord {
    pub b_name: String,
    pub name: Option<String>,
    pub name_e: Option<String>,
    pub rotatable: bool,
    pub movable: bool,
    pub visible: bool,
    pub operational: bool,
    pub ik: bool,
    pub add_rot: bool,
    pub add_move: bool,
    /// Business name of the inherit source.
    pub target: Option<String>,
    pub power: f32,
    pub fixed_axis: bool,
    pub local_axis: bool,
    pub local_x: Vec3,
    pub local_z: Vec3,
    pub level: i32,
    pub after_physical: bool,
}

/// Per-channel color override; absent channels keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorOverride {
    pub r: Option<f32>,
    pub g: Option<f32>,
    pub b: Option<f32>,
    pub a: Option<f32>,
}

impl ColorOverride {
    pub fn rgba(c: Vec4) -> ColorOverride {
        ColorOverride {
            r: Some(c[0]),
            g: Some(c[1]),
            b: Some(c[2]),
            a: Some(c[3]),
        }
    }

    pub fn rgb(c: Vec3) -> ColorOverride {
        ColorOverride {
            a: None,
            ..ColorOverride::rgba([c[0], c[1], c[2], 0.0])
        }
    }

    pub fn apply_rgba(&self, c: &mut Vec4) {
        for (slot, value) in c.iter_mut().zip([self.r, self.g, self.b, self.a]) {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }

    pub fn apply_rgb(&self, c: &mut Vec3) {
        for (slot, value) in c.iter_mut().zip([self.r, self.g, self.b]) {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphereRecord {
    pub path: String,
    pub mode: SphereMode,
}

/// Rendering hints. Every `None` keeps the value derived from the host material.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialRecord {
    pub b_name: String,
    pub name: Option<String>,
    pub name_e: Option<String>,
    pub use_systemtoon: Option<bool>,
    /// System toon id, or a texture path; "" and "-1" mean none.
    pub toon: Option<String>,
    pub both: Option<bool>,
    pub ground_shadow: Option<bool>,
    pub drop_shadow: Option<bool>,
    pub on_shadow: Option<bool>,
    pub on_edge: Option<bool>,
    pub edge_size: Option<f32>,
    pub power: Option<f32>,
    pub edge_color: Option<ColorOverride>,
    pub diffuse: Option<ColorOverride>,
    pub specular: Option<ColorOverride>,
    pub ambient: Option<ColorOverride>,
    pub sphere: Option<SphereRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialOffsetRecord {
    /// `None` targets every material.
    pub material_name: Option<String>,
    pub operation: MaterialOperation,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub power: f32,
    pub ambient: Vec3,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture: Vec4,
    pub sphere: Vec4,
    pub toon: Vec4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneOffsetRecord {
    pub bone: String,
    pub translation: Vec3,
    /// Quaternion x, y, z, w.
    pub rotation: Vec4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupOffsetRecord {
    pub morph: String,
    pub factor: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphRecord {
    pub b_name: String,
    pub name: Option<String>,
    pub name_e: Option<String>,
    pub group: Panel,
    /// Morph kind tag, when given.
    pub kind: Option<u8>,
    pub material_offsets: Vec<MaterialOffsetRecord>,
    pub bone_offsets: Vec<BoneOffsetRecord>,
    pub group_offsets: Vec<GroupOffsetRecord>,
}

impl MorphRecord {
    pub fn new<S: Into<String>>(b_name: S) -> MorphRecord {
        MorphRecord {
            b_name: b_name.into(),
            name: None,
            name_e: None,
            group: Panel::Other,
            kind: None,
            material_offsets: vec![],
            bone_offsets: vec![],
            group_offsets: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    Bone,
    Morph,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub kind: TabKind,
    /// Business name of the member.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelRecord {
    pub name: String,
    pub name_e: Option<String>,
    pub special: bool,
    pub tabs: Vec<Tab>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RigidRecord {
    pub name: String,
    pub name_e: Option<String>,
    /// Business name of the bone; `None` is attached to the world.
    pub attach: Option<String>,
    pub physics: u8,
    pub group: u8,
    /// Signed on disk; -1 sets every bit.
    pub collision_mask: u16,
    pub shape: u8,
    pub size: Vec3,
    pub position: Vec3,
    /// Degrees.
    pub rotation: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointRecord {
    pub name: String,
    pub name_e: Option<String>,
    pub body_a: Option<String>,
    pub body_b: Option<String>,
    pub position: Vec3,
    /// Degrees, like the rotation limits.
    pub rotation: Vec3,
    pub position_min: Vec3,
    pub position_max: Vec3,
    pub rotation_min: Vec3,
    pub rotation_max: Vec3,
    pub position_spring: Vec3,
    pub rotation_spring: Vec3,
}

/// Parsed sidecar. Record order is the declared order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sidecar {
    pub header: Option<Header>,
    pub morphs: Vec<MorphRecord>,
    pub bones: Vec<BoneRecord>,
    /// `None` when the file has no `labels` element at all.
    pub labels: Option<Vec<LabelRecord>>,
    pub materials: Vec<MaterialRecord>,
    pub rigids: Vec<RigidRecord>,
    pub joints: Vec<JointRecord>,
}

static DEFAULT_JP: &str = include_str!("default_jp.xml");
static DEFAULT_EN: &str = include_str!("default_en.xml");

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |c| c.tag_name().name() == name)
}

/// `list/item` elements, or nothing when the list is missing.
fn items<'a, 'input: 'a>(
    root: Node<'a, 'input>,
    list: &'a str,
    item: &'a str,
) -> Vec<Node<'a, 'input>> {
    child(root, list)
        .map(|l| children(l, item).collect())
        .unwrap_or_default()
}

fn string(node: Node, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_owned)
}

fn number<T: std::str::FromStr>(node: Node, name: &str) -> Option<T> {
    let raw = node.attribute(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(
                element = node.tag_name().name(),
                attribute = name,
                value = raw,
                "ignoring malformed number"
            );
            None
        }
    }
}

/// Written signed (`-1` for every group); the unsigned spelling is accepted too.
fn collision_mask(node: Node) -> Option<u16> {
    let raw = number::<i32>(node, "groups")?;
    match i16::try_from(raw) {
        Ok(v) => Some(v as u16),
        Err(_) => match u16::try_from(raw) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(
                    element = node.tag_name().name(),
                    attribute = "groups",
                    value = raw,
                    "collision mask out of 16-bit range"
                );
                None
            }
        },
    }
}

fn flag(node: Node, name: &str) -> Option<bool> {
    number::<i32>(node, name).map(|v| v != 0)
}

fn vec3(node: Option<Node>) -> Vec3 {
    node.map_or([0.0; 3], |n| {
        [
            number(n, "x").unwrap_or(0.0),
            number(n, "y").unwrap_or(0.0),
            number(n, "z").unwrap_or(0.0),
        ]
    })
}

fn color(node: Node) -> ColorOverride {
    ColorOverride {
        r: number(node, "r"),
        g: number(node, "g"),
        b: number(node, "b"),
        a: number(node, "a"),
    }
}

fn rgba(node: Option<Node>) -> Vec4 {
    node.map_or([0.0; 4], |n| {
        let c = color(n);
        [
            c.r.unwrap_or(0.0),
            c.g.unwrap_or(0.0),
            c.b.unwrap_or(0.0),
            c.a.unwrap_or(0.0),
        ]
    })
}

fn rgb(node: Option<Node>) -> Vec3 {
    let c = rgba(node);
    [c[0], c[1], c[2]]
}

fn text(node: Option<Node>) -> Option<String> {
    node.map(|n| n.text().unwrap_or("").to_owned())
}

fn read_bone(node: Node) -> Option<BoneRecord> {
    Some(BoneRecord {
        b_name: string(node, "b_name")?,
        name: string(node, "name"),
        name_e: string(node, "name_e"),
        rotatable: flag(node, "rotatable").unwrap_or(false),
        movable: flag(node, "movable").unwrap_or(false),
        visible: flag(node, "visible").unwrap_or(false),
        operational: flag(node, "operational").unwrap_or(false),
        ik: flag(node, "ik").unwrap_or(false),
        add_rot: flag(node, "add_rot").unwrap_or(false),
        add_move: flag(node, "add_move").unwrap_or(false),
        target: string(node, "target"),
        power: number(node, "power").unwrap_or(0.0),
        fixed_axis: flag(node, "fixed_axis").unwrap_or(false),
        local_axis: flag(node, "local_axis").unwrap_or(false),
        local_x: vec3(child(node, "local_x")),
        local_z: vec3(child(node, "local_z")),
        level: number(node, "level").unwrap_or(0),
        after_physical: flag(node, "after_physical").unwrap_or(false),
    })
}

fn read_material(node: Node) -> Option<MaterialRecord> {
    Some(MaterialRecord {
        b_name: string(node, "b_name")?,
        name: string(node, "name"),
        name_e: string(node, "name_e"),
        use_systemtoon: flag(node, "use_systemtoon"),
        toon: string(node, "toon"),
        both: flag(node, "both"),
        ground_shadow: flag(node, "ground_shadow"),
        drop_shadow: flag(node, "drop_shadow"),
        on_shadow: flag(node, "on_shadow"),
        on_edge: flag(node, "on_edge"),
        edge_size: number(node, "edge_size"),
        power: number(node, "power"),
        edge_color: child(node, "edge_color").map(color),
        diffuse: child(node, "deffuse").map(color),
        specular: child(node, "specular").map(color),
        ambient: child(node, "ambient").map(color),
        sphere: child(node, "sphere").map(|s| SphereRecord {
            path: string(s, "path").unwrap_or_default(),
            mode: number::<u8>(s, "type")
                .and_then(|t| SphereMode::try_from(t).ok())
                .unwrap_or(SphereMode::None),
        }),
    })
}

fn read_morph(node: Node) -> Option<MorphRecord> {
    let b_name = string(node, "b_name")?;
    let material_offsets = items(node, "material_offsets", "material_offset")
        .into_iter()
        .map(|o| MaterialOffsetRecord {
            material_name: string(o, "material_name"),
            operation: match number::<u8>(o, "effect_type") {
                Some(1) => MaterialOperation::Add,
                _ => MaterialOperation::Multiply,
            },
            diffuse: rgba(child(o, "mat_diffuse")),
            specular: rgb(child(o, "mat_speculer")),
            power: number(o, "power").unwrap_or(0.0),
            ambient: rgb(child(o, "mat_ambient")),
            edge_color: rgba(child(o, "mat_edge_color")),
            edge_size: number(o, "edge_size").unwrap_or(0.0),
            texture: rgba(child(o, "mat_texture")),
            sphere: rgba(child(o, "mat_sphere")),
            toon: rgba(child(o, "mat_toon")),
        })
        .collect();
    let bone_offsets = items(node, "bone_offsets", "bone_offset")
        .into_iter()
        .filter_map(|o| {
            let rotate = child(o, "rotate");
            let [x, y, z] = vec3(rotate);
            Some(BoneOffsetRecord {
                bone: string(o, "bone")?,
                translation: vec3(child(o, "move")),
                rotation: [
                    x,
                    y,
                    z,
                    rotate.and_then(|r| number(r, "w")).unwrap_or(1.0),
                ],
            })
        })
        .collect();
    let group_offsets = items(node, "group_offsets", "group_offset")
        .into_iter()
        .filter_map(|o| {
            Some(GroupOffsetRecord {
                morph: string(o, "morph")?,
                factor: number(o, "factor").unwrap_or(1.0),
            })
        })
        .collect();
    Some(MorphRecord {
        name: string(node, "name"),
        name_e: string(node, "name_e"),
        group: number::<u8>(node, "group")
            .and_then(|g| Panel::try_from(g).ok())
            .unwrap_or(Panel::Other),
        kind: number(node, "type"),
        material_offsets,
        bone_offsets,
        group_offsets,
        ..MorphRecord::new(b_name)
    })
}

fn read_label(node: Node) -> LabelRecord {
    let name = string(node, "name").unwrap_or_else(|| "label".to_owned());
    LabelRecord {
        name_e: string(node, "name_e"),
        special: number::<i32>(node, "type") == Some(1),
        tabs: children(node, "tab")
            .filter_map(|t| {
                Some(Tab {
                    kind: match t.attribute("type") {
                        Some("bone") => TabKind::Bone,
                        _ => TabKind::Morph,
                    },
                    name: string(t, "name")?,
                })
            })
            .collect(),
        name,
    }
}

fn read_rigid(node: Node) -> RigidRecord {
    let size = child(node, "size");
    let axis = |name: &str| size.and_then(|s| number(s, name)).unwrap_or(0.0);
    RigidRecord {
        name: string(node, "name").unwrap_or_default(),
        name_e: string(node, "name_e"),
        attach: string(node, "attach").filter(|a| a != "World"),
        physics: number(node, "type").unwrap_or(0),
        group: number(node, "group").unwrap_or(0),
        collision_mask: collision_mask(node).unwrap_or(0xFFFF),
        shape: number(node, "shape").unwrap_or(0),
        size: [axis("a"), axis("b"), axis("c")],
        position: vec3(child(node, "pos")),
        rotation: vec3(child(node, "rot")),
        mass: number(node, "mass").unwrap_or(1.0),
        linear_damping: number(node, "pos_dump").unwrap_or(0.0),
        angular_damping: number(node, "rot_dump").unwrap_or(0.0),
        restitution: number(node, "restitution").unwrap_or(0.0),
        friction: number(node, "friction").unwrap_or(0.0),
    }
}

fn read_joint(node: Node) -> JointRecord {
    let pos_limit = child(node, "pos_limit");
    let rot_limit = child(node, "rot_limit");
    JointRecord {
        name: string(node, "name").unwrap_or_default(),
        name_e: string(node, "name_e"),
        body_a: string(node, "body_A"),
        body_b: string(node, "body_B"),
        position: vec3(child(node, "pos")),
        rotation: vec3(child(node, "rot")),
        position_min: vec3(pos_limit.and_then(|l| child(l, "from"))),
        position_max: vec3(pos_limit.and_then(|l| child(l, "to"))),
        rotation_min: vec3(rot_limit.and_then(|l| child(l, "from"))),
        rotation_max: vec3(rot_limit.and_then(|l| child(l, "to"))),
        position_spring: vec3(child(node, "pos_spring")),
        rotation_spring: vec3(child(node, "rot_spring")),
    }
}

/// Records without a business name cannot be looked up and are dropped.
fn keyed<T, F: Fn(Node) -> Option<T>>(nodes: Vec<Node>, kind: &str, read: F) -> Vec<T> {
    nodes
        .into_iter()
        .filter_map(|n| {
            let record = read(n);
            if record.is_none() {
                warn!(kind, "sidecar record without b_name skipped");
            }
            record
        })
        .collect()
}

impl Sidecar {
    pub fn parse(source: &str) -> Result<Sidecar> {
        let document = Document::parse(source)?;
        let root = document.root_element();
        let header = child(root, "pmdinfo").map(|info| Header {
            name: text(child(info, "name")),
            name_e: text(child(info, "name_e")),
            comment: text(child(info, "comment")),
            comment_e: text(child(info, "comment_e")),
        });
        Ok(Sidecar {
            header,
            morphs: keyed(items(root, "morphs", "morph"), "morph", read_morph),
            bones: keyed(items(root, "bones", "bone"), "bone", read_bone),
            labels: child(root, "labels").map(|l| children(l, "label").map(read_label).collect()),
            materials: keyed(
                items(root, "materials", "material"),
                "material",
                read_material,
            ),
            rigids: items(root, "rigid_bodies", "rigid")
                .into_iter()
                .map(read_rigid)
                .collect(),
            joints: items(root, "constraints", "constraint")
                .into_iter()
                .map(read_joint)
                .collect(),
        })
    }

    /// Reads the sidecar at `path`, `None` when there is no such file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Sidecar>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Sidecar::parse(&text).map(Some)
    }

    /// Built-in template for the selected language.
    pub fn template(use_japanese: bool) -> Result<Sidecar> {
        Sidecar::parse(if use_japanese { DEFAULT_JP } else { DEFAULT_EN })
    }

    pub fn bone(&self, b_name: &str) -> Option<&BoneRecord> {
        self.bones.iter().find(|b| b.b_name == b_name)
    }

    pub fn material(&self, b_name: &str) -> Option<&MaterialRecord> {
        self.materials.iter().find(|m| m.b_name == b_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ns0:pmxstatus xmlns:ns0="local" xml:lang="jp">
<pmdinfo>
<name>ミク</name>
<comment>line1
line2</comment>
</pmdinfo>
<morphs>
<morph b_name="smile" name="笑い" group="3" type="8">
  <material_offsets>
    <material_offset material_name="face" effect_type="1" power="0.5">
      <mat_diffuse r="0.1" g="0.2" b="0.3" a="0.4" />
    </material_offset>
    <material_offset effect_type="0" />
  </material_offsets>
</morph>
<morph name="orphan" />
<morph b_name="wink" group="9" />
</morphs>
<bones>
<bone b_name="arm_L" name="左腕" rotatable="1" movable="0" add_rot="1" target="shoulder_L" power="0.5" level="2">
<local_x x="1.0" y="0.0" z="0.0" />
</bone>
</bones>
<materials>
<material b_name="face" edge_size="0.3" both="1">
<edge_color r="0.5" />
</material>
</materials>
<rigid_bodies>
<rigid name="head" attach="World" type="1" group="2" groups="-1" shape="1" mass="2.5">
<size a="1.0" b="2.0" c="3.0" />
<rot x="90.0" y="0.0" z="0.0" />
</rigid>
</rigid_bodies>
<constraints>
<constraint name="neck" body_A="head" body_B="3">
<rot_limit><from x="-10.0" y="0" z="0" /><to x="10" y="0" z="0" /></rot_limit>
</constraint>
</constraints>
</ns0:pmxstatus>
"#;

    #[test]
    fn parses_every_section() {
        let sidecar = Sidecar::parse(SAMPLE).unwrap();
        let header = sidecar.header.as_ref().unwrap();
        assert_eq!(header.name.as_deref(), Some("ミク"));
        assert_eq!(header.name_e, None);
        assert_eq!(header.comment.as_deref(), Some("line1\nline2"));

        assert_eq!(sidecar.morphs.len(), 2);
        let smile = &sidecar.morphs[0];
        assert_eq!(smile.group, Panel::Mouth);
        assert_eq!(smile.kind, Some(8));
        assert_eq!(smile.material_offsets.len(), 2);
        assert_eq!(smile.material_offsets[0].operation, MaterialOperation::Add);
        assert_eq!(smile.material_offsets[0].diffuse, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(smile.material_offsets[1].material_name, None);
        assert_eq!(sidecar.morphs[1].group, Panel::Other);

        let arm = sidecar.bone("arm_L").unwrap();
        assert!(arm.rotatable && !arm.movable && !arm.visible);
        assert_eq!(arm.target.as_deref(), Some("shoulder_L"));
        assert_eq!(arm.local_x, [1.0, 0.0, 0.0]);
        assert_eq!(arm.level, 2);

        assert!(sidecar.labels.is_none());

        let face = sidecar.material("face").unwrap();
        assert_eq!(face.edge_size, Some(0.3));
        assert_eq!(face.both, Some(true));
        assert_eq!(face.diffuse, None);
        assert_eq!(face.edge_color.unwrap().g, None);

        let rigid = &sidecar.rigids[0];
        assert_eq!(rigid.attach, None);
        assert_eq!(rigid.collision_mask, 0xFFFF);
        assert_eq!(rigid.size, [1.0, 2.0, 3.0]);
        assert_eq!(rigid.rotation, [90.0, 0.0, 0.0]);

        let joint = &sidecar.joints[0];
        assert_eq!(joint.body_b.as_deref(), Some("3"));
        assert_eq!(joint.rotation_min, [-10.0, 0.0, 0.0]);
        assert_eq!(joint.position_spring, [0.0; 3]);
    }

    #[test]
    fn malformed_numbers_are_ignored() {
        let sidecar = Sidecar::parse(
            r#"<pmxstatus><materials><material b_name="m" edge_size="thick" /></materials></pmxstatus>"#,
        )
        .unwrap();
        assert_eq!(sidecar.materials[0].edge_size, None);
    }

    #[test]
    fn collision_masks_stay_in_16_bits() {
        let sidecar = Sidecar::parse(
            r#"<pmxstatus><rigid_bodies>
<rigid name="a" groups="-2" />
<rigid name="b" groups="65534" />
<rigid name="c" groups="70000" />
<rigid name="d" groups="-40000" />
</rigid_bodies></pmxstatus>"#,
        )
        .unwrap();
        let masks: Vec<u16> = sidecar.rigids.iter().map(|r| r.collision_mask).collect();
        assert_eq!(masks, vec![0xFFFE, 0xFFFE, 0xFFFF, 0xFFFF]);
    }

    #[test]
    fn broken_xml_is_an_error() {
        assert!(matches!(
            Sidecar::parse("<pmxstatus><bones>"),
            Err(crate::error::Error::Xml(_))
        ));
    }

    #[test]
    fn templates_parse() {
        for use_japanese in [true, false] {
            let template = Sidecar::template(use_japanese).unwrap();
            let header = template.header.unwrap();
            assert_eq!(header.name.as_deref(), Some("モデル名"));
            assert_eq!(header.name_e.as_deref(), Some("Model Name"));
            assert!(template.labels.is_none());
            let mogu = template
                .morphs
                .iter()
                .find(|m| m.name.as_deref() == Some("もぐもぐ"))
                .unwrap();
            assert_eq!(mogu.group, Panel::Mouth);
            let expected = if use_japanese { "もぐもぐ" } else { "Mogumogu" };
            assert_eq!(mogu.b_name, expected);
        }
    }

    #[test]
    fn color_override_touches_only_given_channels() {
        let mut c = [1.0, 1.0, 1.0, 1.0];
        ColorOverride {
            g: Some(0.5),
            ..ColorOverride::default()
        }
        .apply_rgba(&mut c);
        assert_eq!(c, [1.0, 0.5, 1.0, 1.0]);
    }
}
