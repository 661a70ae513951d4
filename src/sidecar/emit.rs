//! Sidecar serialization and numbered backups.

use crate::error::Result;
use crate::sidecar::document::{
    BoneRecord, ColorOverride, Header, JointRecord, LabelRecord, MaterialRecord, MorphRecord,
    RigidRecord, Sidecar, TabKind,
};
use crate::types::{MaterialOperation, Vec3, Vec4};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

struct Tag(Element);

impl Tag {
    fn new(name: &str) -> Tag {
        Tag(Element::new(name))
    }

    fn attr<V: ToString>(mut self, key: &str, value: V) -> Tag {
        self.0.attributes.insert(key.to_owned(), value.to_string());
        self
    }

    fn opt<V: ToString>(self, key: &str, value: Option<V>) -> Tag {
        match value {
            Some(v) => self.attr(key, v),
            None => self,
        }
    }

    fn flag(self, key: &str, value: bool) -> Tag {
        self.attr(key, u8::from(value))
    }

    fn opt_flag(self, key: &str, value: Option<bool>) -> Tag {
        self.opt(key, value.map(u8::from))
    }

    fn child(mut self, child: Element) -> Tag {
        self.0.children.push(XMLNode::Element(child));
        self
    }

    fn opt_child(self, child: Option<Element>) -> Tag {
        match child {
            Some(c) => self.child(c),
            None => self,
        }
    }

    /// Adds a list element holding `items`; nothing when `items` is empty.
    fn list(self, name: &str, items: Vec<Element>) -> Tag {
        if items.is_empty() {
            return self;
        }
        let mut list = Element::new(name);
        list.children
            .extend(items.into_iter().map(XMLNode::Element));
        self.child(list)
    }

    fn text(mut self, text: &str) -> Tag {
        self.0.children.push(XMLNode::Text(text.to_owned()));
        self
    }

    fn build(self) -> Element {
        self.0
    }
}

fn float(v: f32) -> String {
    format!("{:.7}", v)
}

fn xyz(name: &str, v: Vec3) -> Element {
    Tag::new(name)
        .attr("x", float(v[0]))
        .attr("y", float(v[1]))
        .attr("z", float(v[2]))
        .build()
}

fn rgba(name: &str, c: Vec4) -> Element {
    color(name, &ColorOverride::rgba(c))
}

fn rgb(name: &str, c: Vec3) -> Element {
    color(name, &ColorOverride::rgb(c))
}

fn color(name: &str, c: &ColorOverride) -> Element {
    Tag::new(name)
        .opt("r", c.r.map(float))
        .opt("g", c.g.map(float))
        .opt("b", c.b.map(float))
        .opt("a", c.a.map(float))
        .build()
}

/// Line breaks as CRLF, the way PMX tools store comments.
pub(super) fn crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

fn header(h: &Header) -> Element {
    let field = |name: &str, value: &Option<String>| {
        value
            .as_ref()
            .map(|v| Tag::new(name).text(&crlf(v)).build())
    };
    Tag::new("pmdinfo")
        .opt_child(field("name", &h.name))
        .opt_child(field("name_e", &h.name_e))
        .opt_child(field("comment", &h.comment))
        .opt_child(field("comment_e", &h.comment_e))
        .build()
}

fn morph(m: &MorphRecord) -> Element {
    let material_offsets = m
        .material_offsets
        .iter()
        .map(|o| {
            Tag::new("material_offset")
                .opt("material_name", o.material_name.as_ref())
                .attr(
                    "effect_type",
                    match o.operation {
                        MaterialOperation::Multiply => 0,
                        MaterialOperation::Add => 1,
                    },
                )
                .attr("power", o.power)
                .attr("edge_size", o.edge_size)
                .child(rgba("mat_diffuse", o.diffuse))
                .child(rgb("mat_speculer", o.specular))
                .child(rgb("mat_ambient", o.ambient))
                .child(rgba("mat_edge_color", o.edge_color))
                .child(rgba("mat_texture", o.texture))
                .child(rgba("mat_sphere", o.sphere))
                .child(rgba("mat_toon", o.toon))
                .build()
        })
        .collect();
    let bone_offsets = m
        .bone_offsets
        .iter()
        .map(|o| {
            let [x, y, z, w] = o.rotation;
            Tag::new("bone_offset")
                .attr("bone", &o.bone)
                .child(xyz("move", o.translation))
                .child(
                    Tag::new("rotate")
                        .attr("x", float(x))
                        .attr("y", float(y))
                        .attr("z", float(z))
                        .attr("w", float(w))
                        .build(),
                )
                .build()
        })
        .collect();
    let group_offsets = m
        .group_offsets
        .iter()
        .map(|o| {
            Tag::new("group_offset")
                .attr("morph", &o.morph)
                .attr("factor", o.factor)
                .build()
        })
        .collect();
    Tag::new("morph")
        .attr("b_name", &m.b_name)
        .opt("name", m.name.as_ref())
        .opt("name_e", m.name_e.as_ref())
        .attr("group", u8::from(m.group))
        .opt("type", m.kind)
        .list("material_offsets", material_offsets)
        .list("bone_offsets", bone_offsets)
        .list("group_offsets", group_offsets)
        .build()
}

fn bone(b: &BoneRecord) -> Element {
    let mut tag = Tag::new("bone")
        .attr("b_name", &b.b_name)
        .opt("name", b.name.as_ref())
        .opt("name_e", b.name_e.as_ref())
        .flag("rotatable", b.rotatable)
        .flag("movable", b.movable)
        .flag("visible", b.visible)
        .flag("operational", b.operational)
        .flag("ik", b.ik)
        .flag("add_rot", b.add_rot)
        .flag("add_move", b.add_move)
        .opt("target", b.target.as_ref())
        .attr("power", b.power)
        .flag("fixed_axis", b.fixed_axis)
        .flag("local_axis", b.local_axis)
        .attr("level", b.level)
        .flag("after_physical", b.after_physical);
    if b.local_axis {
        tag = tag
            .child(xyz("local_x", b.local_x))
            .child(xyz("local_z", b.local_z));
    }
    tag.build()
}

fn label(l: &LabelRecord) -> Element {
    let mut tag = Tag::new("label")
        .attr("name", &l.name)
        .opt("name_e", l.name_e.as_ref())
        .flag("type", l.special);
    for t in &l.tabs {
        let kind = match t.kind {
            TabKind::Bone => "bone",
            TabKind::Morph => "morph",
        };
        tag = tag.child(Tag::new("tab").attr("type", kind).attr("name", &t.name).build());
    }
    tag.build()
}

fn material(m: &MaterialRecord) -> Element {
    Tag::new("material")
        .attr("b_name", &m.b_name)
        .opt("name", m.name.as_ref())
        .opt("name_e", m.name_e.as_ref())
        .opt_flag("use_systemtoon", m.use_systemtoon)
        .opt("toon", m.toon.as_ref())
        .opt_flag("both", m.both)
        .opt_flag("ground_shadow", m.ground_shadow)
        .opt_flag("drop_shadow", m.drop_shadow)
        .opt_flag("on_shadow", m.on_shadow)
        .opt_flag("on_edge", m.on_edge)
        .opt("edge_size", m.edge_size)
        .opt("power", m.power)
        .opt_child(m.edge_color.as_ref().map(|c| color("edge_color", c)))
        .opt_child(m.diffuse.as_ref().map(|c| color("deffuse", c)))
        .opt_child(m.specular.as_ref().map(|c| color("specular", c)))
        .opt_child(m.ambient.as_ref().map(|c| color("ambient", c)))
        .opt_child(m.sphere.as_ref().map(|s| {
            Tag::new("sphere")
                .attr("path", &s.path)
                .attr("type", u8::from(s.mode))
                .build()
        }))
        .build()
}

fn rigid(r: &RigidRecord) -> Element {
    Tag::new("rigid")
        .attr("name", &r.name)
        .opt("name_e", r.name_e.as_ref())
        .attr("attach", r.attach.as_deref().unwrap_or("World"))
        .attr("type", r.physics)
        .attr("group", r.group)
        // all 16 group bits, spelled signed
        .attr("groups", r.collision_mask as i16)
        .attr("shape", r.shape)
        .attr("mass", r.mass)
        .attr("pos_dump", r.linear_damping)
        .attr("rot_dump", r.angular_damping)
        .attr("restitution", r.restitution)
        .attr("friction", r.friction)
        .child(
            Tag::new("size")
                .attr("a", float(r.size[0]))
                .attr("b", float(r.size[1]))
                .attr("c", float(r.size[2]))
                .build(),
        )
        .child(xyz("pos", r.position))
        .child(xyz("rot", r.rotation))
        .build()
}

fn limit(name: &str, from: Vec3, to: Vec3) -> Element {
    Tag::new(name)
        .child(xyz("from", from))
        .child(xyz("to", to))
        .build()
}

fn joint(j: &JointRecord) -> Element {
    Tag::new("constraint")
        .attr("name", &j.name)
        .opt("name_e", j.name_e.as_ref())
        .opt("body_A", j.body_a.as_ref())
        .opt("body_B", j.body_b.as_ref())
        .child(xyz("pos", j.position))
        .child(xyz("rot", j.rotation))
        .child(limit("pos_limit", j.position_min, j.position_max))
        .child(limit("rot_limit", j.rotation_min, j.rotation_max))
        .child(xyz("pos_spring", j.position_spring))
        .child(xyz("rot_spring", j.rotation_spring))
        .build()
}

fn document(sidecar: &Sidecar) -> Element {
    let mut root = Tag::new("pmxstatus")
        .attr("xml:lang", "jp")
        .opt_child(sidecar.header.as_ref().map(header))
        .list("morphs", sidecar.morphs.iter().map(morph).collect())
        .list("bones", sidecar.bones.iter().map(bone).collect());
    if let Some(labels) = &sidecar.labels {
        let mut list = Element::new("labels");
        list.children
            .extend(labels.iter().map(|l| XMLNode::Element(label(l))));
        root = root.child(list);
    }
    let mut root = root
        .list("materials", sidecar.materials.iter().map(material).collect())
        .list("rigid_bodies", sidecar.rigids.iter().map(rigid).collect())
        .list("constraints", sidecar.joints.iter().map(joint).collect())
        .build();
    let mut namespaces = Namespace::empty();
    namespaces.put("ns0", "local");
    root.prefix = Some("ns0".to_owned());
    root.namespace = Some("local".to_owned());
    root.namespaces = Some(namespaces);
    root
}

/// UTF-8 text with CRLF line breaks.
pub fn to_xml(sidecar: &Sidecar) -> Result<Vec<u8>> {
    let config = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("  ")
        .line_separator("\r\n");
    let mut out = Vec::new();
    document(sidecar).write_with_config(&mut out, config)?;
    Ok(out)
}

fn numbered(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}{}", stem, n),
    };
    path.with_file_name(name)
}

/// Shifts `model.xml`, `model1.xml`, ... up by one, keeping at most `max` numbered copies.
pub fn rotate_backups(path: &Path, max: u32) -> Result<()> {
    if max == 0 || !path.exists() {
        return Ok(());
    }
    for i in (1..max).rev() {
        let from = numbered(path, i);
        if from.exists() {
            let to = numbered(path, i + 1);
            if to.exists() {
                fs::remove_file(&to)?;
            }
            fs::rename(&from, &to)?;
        }
    }
    let first = numbered(path, 1);
    if first.exists() {
        fs::remove_file(&first)?;
    }
    fs::rename(path, &first)?;
    Ok(())
}

/// Serializes first, then rotates the backups and writes the new file.
pub fn write_sidecar(path: &Path, sidecar: &Sidecar, backups: u32) -> Result<()> {
    let bytes = to_xml(sidecar)?;
    rotate_backups(path, backups)?;
    fs::write(path, bytes)?;
    debug!(path = %path.display(), backups, "wrote sidecar");
    Ok(())
}
