//! XML sidecar: names, rendering hints, labels and physics the binary cannot carry.

mod document;
mod emit;
mod reconcile;

pub use document::{
    BoneOffsetRecord, BoneRecord, ColorOverride, GroupOffsetRecord, Header, JointRecord,
    LabelRecord, MaterialOffsetRecord, MaterialRecord, MorphRecord, RigidRecord, Sidecar,
    SphereRecord, Tab, TabKind,
};
pub use emit::{rotate_backups, to_xml, write_sidecar};
pub use reconcile::{
    apply_material, material_record, resolve_joints, resolve_labels, resolve_morphs,
    resolve_rigids, BusinessNames, Sources,
};
