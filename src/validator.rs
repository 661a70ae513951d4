//! Name uniqueness checks run before anything is written.

use crate::error::{Error, Result};
use crate::sidecar::Sidecar;
use crate::types::Model;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Bone,
    Morph,
    Rigid,
    Joint,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Namespace::Bone => "bone",
            Namespace::Morph => "morph",
            Namespace::Rigid => "rigid",
            Namespace::Joint => "joint",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Model,
    Sidecar,
}

/// One duplicated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub namespace: Namespace,
    pub origin: Origin,
    pub name: String,
    pub count: usize,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.origin {
            Origin::Model => "model",
            Origin::Sidecar => "sidecar",
        };
        write!(
            f,
            "{} name {:?} is used {} times in the {}; {} names must be unique",
            self.namespace, self.name, self.count, origin, self.namespace
        )
    }
}

/// Duplicated names with their counts, in first-occurrence order.
fn duplicates<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Vec<(&'a str, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = vec![];
    for name in names {
        let count = counts.entry(name).or_insert(0);
        if *count == 0 {
            order.push(name);
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter_map(|name| match counts[name] {
            1 => None,
            n => Some((name, n)),
        })
        .collect()
}

fn collect<'a, I: IntoIterator<Item = &'a str>>(
    out: &mut Vec<Violation>,
    namespace: Namespace,
    origin: Origin,
    names: I,
) {
    out.extend(duplicates(names).into_iter().map(|(name, count)| Violation {
        namespace,
        origin,
        name: name.to_owned(),
        count,
    }));
}

/// The secondary column falls back to the primary name when empty.
fn column<'a>(name: &'a str, name_en: &'a str, use_primary_language: bool) -> &'a str {
    if use_primary_language || name_en.is_empty() {
        name
    } else {
        name_en
    }
}

pub fn validate(model: &Model, use_primary_language: bool) -> Vec<Violation> {
    let mut out = vec![];
    collect(
        &mut out,
        Namespace::Bone,
        Origin::Model,
        model
            .bones
            .iter()
            .map(|b| column(&b.name, &b.name_en, use_primary_language)),
    );
    collect(
        &mut out,
        Namespace::Morph,
        Origin::Model,
        model
            .morphs
            .iter()
            .map(|m| column(&m.name, &m.name_en, use_primary_language)),
    );
    collect(
        &mut out,
        Namespace::Rigid,
        Origin::Model,
        model.rigids.iter().map(|r| r.name.as_str()),
    );
    collect(
        &mut out,
        Namespace::Joint,
        Origin::Model,
        model.joints.iter().map(|j| j.name.as_str()),
    );
    out
}

pub fn validate_sidecar(sidecar: &Sidecar) -> Vec<Violation> {
    let mut out = vec![];
    collect(
        &mut out,
        Namespace::Bone,
        Origin::Sidecar,
        sidecar.bones.iter().map(|b| b.b_name.as_str()),
    );
    collect(
        &mut out,
        Namespace::Morph,
        Origin::Sidecar,
        sidecar.morphs.iter().map(|m| m.b_name.as_str()),
    );
    collect(
        &mut out,
        Namespace::Rigid,
        Origin::Sidecar,
        sidecar.rigids.iter().map(|r| r.name.as_str()),
    );
    collect(
        &mut out,
        Namespace::Joint,
        Origin::Sidecar,
        sidecar.joints.iter().map(|j| j.name.as_str()),
    );
    out
}

/// Turns a non-empty violation list into [`Error::NameCollision`].
pub fn ensure_unique(violations: Vec<Violation>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::NameCollision(violations))
    }
}
