//! The single bone index space shared by every bone reference in an export.
//!
//! Real host bones come in host order. A bone driving an IK chain with no connected
//! child gets a synthesized tip slot right after it, and the IK controller is moved
//! behind it. An optional sidecar ordering then re-sorts the slots (stable).

use crate::scene::{Constraint, HostBone};
use std::collections::HashMap;
use tracing::warn;

static LR_SUFFIXES: [(&str, &str); 4] = [("_L", "左"), (".L", "左"), ("_R", "右"), (".R", "右")];
static ANKLES: [&str; 2] = ["ankle", "足首"];
const TOE_JP: &str = "つま先";
const TOE_EN: &str = "toe";
const TIP_JP: &str = "先";
const TIP_EN: &str = " tip";

/// Splits a trailing left/right marker: `arm_L` gives `("arm", "_L", "左")`.
pub fn split_lr(name: &str) -> Option<(&str, &'static str, &'static str)> {
    LR_SUFFIXES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|&(suffix, jp)| (&name[..name.len() - suffix.len()], suffix, jp))
}

/// Primary model name for a host bone with no sidecar record: `arm_L` becomes `左arm`.
pub fn default_bone_name(host: &str) -> String {
    match split_lr(host) {
        Some((base, _, jp)) => format!("{}{}", jp, base),
        None => host.to_owned(),
    }
}

/// Host-stable name of a model bone: the selected column with 左/右 turned into `_L`/`_R`.
pub fn business_bone_name(name: &str, name_en: &str, use_japanese: bool) -> String {
    let selected = if !use_japanese && !name_en.is_empty() {
        name_en
    } else {
        name
    };
    if selected.contains('右') {
        format!("{}_R", selected.replace('右', ""))
    } else if selected.contains('左') {
        format!("{}_L", selected.replace('左', ""))
    } else {
        selected.to_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipName {
    pub jp: String,
    pub en: String,
}

impl TipName {
    pub fn business(&self, use_japanese: bool) -> String {
        business_bone_name(&self.jp, &self.en, use_japanese)
    }
}

/// Display names of the tip synthesized for `controller`.
pub fn tip_names(controller: &str) -> TipName {
    match split_lr(controller) {
        Some((base, suffix, jp)) if ANKLES.contains(&base) => TipName {
            jp: format!("{}{}", jp, TOE_JP),
            en: format!("{}{}", TOE_EN, suffix),
        },
        Some((base, suffix, jp)) => TipName {
            jp: format!("{}{}{}", jp, base, TIP_JP),
            en: format!("{}{}{}", base, TIP_EN, suffix),
        },
        None => TipName {
            jp: format!("{}{}", controller, TIP_JP),
            en: format!("{}{}", controller, TIP_EN),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoneSlot {
    Real { name: String },
    Tip { controller: String },
}

impl BoneSlot {
    /// Key in the index: the host name, or the controller name plus `_` for a tip.
    pub fn key(&self) -> String {
        match self {
            BoneSlot::Real { name } => name.clone(),
            BoneSlot::Tip { controller } => format!("{}_", controller),
        }
    }

    /// Name the sidecar files this slot under.
    pub fn business_name(&self, use_japanese: bool) -> String {
        match self {
            BoneSlot::Real { name } => name.clone(),
            BoneSlot::Tip { controller } => tip_names(controller).business(use_japanese),
        }
    }
}

/// Immutable name to index map. Unknown names resolve to -1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneIndex {
    map: HashMap<String, i32>,
}

impl BoneIndex {
    pub fn get(&self, name: &str) -> i32 {
        self.map.get(name).copied().unwrap_or(-1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneOrder {
    pub slots: Vec<BoneSlot>,
    pub index: BoneIndex,
}

fn has_connected_child(bones: &[HostBone], name: &str) -> bool {
    bones
        .iter()
        .any(|b| b.use_connect && b.parent.as_deref() == Some(name))
}

/// Builds the ordered slots and their index.
pub fn build_bone_order(
    bones: &[HostBone],
    xml_order: Option<&[String]>,
    use_japanese: bool,
) -> BoneOrder {
    let mut slots: Vec<BoneSlot> = Vec::with_capacity(bones.len());
    let placed = |slots: &[BoneSlot], name: &str| {
        slots
            .iter()
            .position(|s| matches!(s, BoneSlot::Real { name: n } if n == name))
    };

    for bone in bones {
        if placed(&slots, &bone.name).is_some() {
            continue;
        }
        slots.push(BoneSlot::Real {
            name: bone.name.clone(),
        });
        for constraint in &bone.constraints {
            if let Constraint::Ik { subtarget, .. } = constraint {
                if !has_connected_child(bones, &bone.name) {
                    slots.push(BoneSlot::Tip {
                        controller: bone.name.clone(),
                    });
                }
                if !bones.iter().any(|b| &b.name == subtarget) {
                    warn!(bone = %bone.name, %subtarget, "IK subtarget is not part of the skeleton");
                    continue;
                }
                if let Some(at) = placed(&slots, subtarget) {
                    slots.remove(at);
                }
                slots.push(BoneSlot::Real {
                    name: subtarget.clone(),
                });
            }
        }
    }

    if let Some(order) = xml_order {
        let rank: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .rev()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        slots.sort_by_key(|slot| {
            rank.get(slot.business_name(use_japanese).as_str())
                .copied()
                .unwrap_or(usize::MAX)
        });
    }

    let mut map = HashMap::new();
    for (i, slot) in slots.iter().enumerate() {
        let i = i as i32;
        if let BoneSlot::Tip { controller } = slot {
            let tip = tip_names(controller);
            for alias in [tip.business(true), tip.business(false), tip.jp, tip.en] {
                map.entry(alias).or_insert(i);
            }
        }
        map.insert(slot.key(), i);
    }
    BoneOrder {
        slots,
        index: BoneIndex { map },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(name: &str, parent: Option<&str>, connect: bool) -> HostBone {
        HostBone {
            parent: parent.map(str::to_owned),
            use_connect: connect,
            ..HostBone::new(name, [0.0; 3], [0.0, 0.0, 1.0])
        }
    }

    fn ik(subtarget: &str) -> Constraint {
        Constraint::Ik {
            subtarget: subtarget.to_owned(),
            chain_count: 2,
        }
    }

    fn leg() -> Vec<HostBone> {
        let mut shin = bone("shin_L", Some("thigh_L"), true);
        shin.constraints.push(ik("leg IK_L"));
        vec![
            bone("leg IK_L", None, false),
            bone("thigh_L", None, false),
            shin,
            bone("hip", None, false),
        ]
    }

    fn keys(order: &BoneOrder) -> Vec<String> {
        order.slots.iter().map(BoneSlot::key).collect()
    }

    #[test]
    fn tip_and_controller_follow_the_chain_end() {
        let order = build_bone_order(&leg(), None, true);
        assert_eq!(keys(&order), vec!["thigh_L", "shin_L", "shin_L_", "leg IK_L", "hip"]);
        assert_eq!(order.index.get("leg IK_L"), 3);
        assert_eq!(order.index.get("missing"), -1);
    }

    #[test]
    fn connected_child_suppresses_the_tip() {
        let mut bones = leg();
        bones.push(bone("foot_L", Some("shin_L"), true));
        let order = build_bone_order(&bones, None, true);
        assert!(!order.slots.iter().any(|s| matches!(s, BoneSlot::Tip { .. })));
    }

    #[test]
    fn ordering_is_deterministic() {
        let xml = vec!["hip".to_owned(), "leg IK_L".to_owned()];
        let a = build_bone_order(&leg(), Some(&xml), true);
        let b = build_bone_order(&leg(), Some(&xml), true);
        assert_eq!(a, b);
        assert_eq!(keys(&a), vec!["hip", "leg IK_L", "thigh_L", "shin_L", "shin_L_"]);
    }

    #[test]
    fn missing_subtarget_is_skipped() {
        let mut arm = bone("arm", None, false);
        arm.constraints.push(ik("nowhere"));
        let order = build_bone_order(&[arm], None, true);
        assert_eq!(keys(&order), vec!["arm", "arm_"]);
    }

    #[test]
    fn tip_names_keep_the_side_marker() {
        assert_eq!(
            tip_names("arm_L"),
            TipName {
                jp: "左arm先".to_owned(),
                en: "arm tip_L".to_owned()
            }
        );
        assert_eq!(
            tip_names("足首.R"),
            TipName {
                jp: "右つま先".to_owned(),
                en: "toe.R".to_owned()
            }
        );
        assert_eq!(tip_names("head").en, "head tip");
    }

    #[test]
    fn tip_name_resolves_back_to_its_slot() {
        let mut arm = bone("arm_L", None, false);
        arm.constraints.push(ik("hand IK_L"));
        let bones = vec![arm, bone("hand IK_L", None, false)];
        let first = build_bone_order(&bones, None, true);
        let second = build_bone_order(&bones, None, true);
        let tip = tip_names("arm_L");
        assert_eq!(tip, tip_names("arm_L"));

        let slot = first.index.get("arm_L_");
        assert_eq!(slot, 1);
        // what an import derives from the written bone names
        for use_japanese in [true, false] {
            let reimported = business_bone_name(&tip.jp, &tip.en, use_japanese);
            assert_eq!(second.index.get(&reimported), slot);
        }
    }

    #[test]
    fn business_names_move_the_side_to_a_suffix() {
        assert_eq!(business_bone_name("左腕", "arm_L", true), "腕_L");
        assert_eq!(business_bone_name("右腕", "", false), "腕_R");
        assert_eq!(business_bone_name("センター", "center", false), "center");
        assert_eq!(default_bone_name("腕.R"), "右腕");
        assert_eq!(default_bone_name("center"), "center");
    }
}
