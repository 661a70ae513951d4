//! PMX/PMD model codec with an XML sidecar.
//!
//! ```no_run
//! use pmx_bridge::{load_model, save_model, types::Encode};
//! let model = load_model("/path/to/model.pmx").unwrap();
//! save_model("/path/to/copy.pmx", &model, Encode::Utf16Le).unwrap();
//! ```

pub mod binary_reader;
pub mod binary_writer;
pub mod bone_order;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod legacy;
pub mod pmd;
/// PMX reader
///
/// ```no_run
/// use pmx_bridge::reader::ModelInfoStage;
/// let stage = ModelInfoStage::open("/path/to/pmxfile").unwrap();
/// let (model_info, vertices_stage) = stage.read().unwrap();
/// ```
pub mod reader;
pub mod scene;
pub mod sidecar;
pub mod status;
pub mod types;
pub mod validator;
pub mod writer;

pub use config::Options;
pub use error::{Diagnostic, Error, Report, Result};
pub use export::export_model;
pub use import::import_model;
pub use reader::{load_model, read_model};
pub use writer::{save_model, write_model};

#[cfg(test)]
mod test {
    use crate::error::Error;
    use crate::export::{export_model, tests::leg_scene};
    use crate::import::import_model;
    use crate::pmd::tests::sample_pmd;
    use crate::reader::{read_model, ModelInfoStage};
    use crate::scene::{SceneDescription, SceneWriter};
    use crate::status::FormatKind;
    use crate::types::*;
    use crate::writer::write_model;
    use crate::{load_model, Options, Result};
    use std::f32::consts::PI;
    use std::fs;
    use std::io::Cursor;

    fn round_trip(model: &Model, encode: Encode) -> Model {
        let bytes = write_model(Vec::new(), model, encode).unwrap();
        read_model(Cursor::new(bytes)).unwrap()
    }

    /// Everything but the status header, which the writer recomputes.
    fn assert_same(copy: &Model, model: &Model) {
        let mut expected = model.clone();
        expected.status = copy.status.clone();
        assert_eq!(*copy, expected);
    }

    fn bone(name: &str) -> Bone {
        Bone {
            name: name.to_owned(),
            name_en: format!("{}_en", name),
            ..Bone::default()
        }
    }

    fn vertex(x: f32, weight: VertexWeight) -> Vertex {
        Vertex {
            position: [x, 1.0, -x],
            normal: [0.0, 0.0, -1.0],
            uv: [x / 4.0, 0.5],
            extra_uv: vec![[x, 0.0, 0.0, 1.0]],
            weight,
            edge_scale: 0.5,
        }
    }

    fn full_model() -> Model {
        let vertices = vec![
            vertex(0.0, VertexWeight::BDEF1(0)),
            vertex(
                1.0,
                VertexWeight::BDEF2 {
                    bones: [0, 1],
                    weight: 0.25,
                },
            ),
            vertex(
                2.0,
                VertexWeight::BDEF4 {
                    bones: [0, 1, 2, 3],
                    weights: [0.5, 0.25, 0.125, 0.125],
                },
            ),
            vertex(
                3.0,
                VertexWeight::SDEF {
                    bones: [1, 2],
                    weight: 0.75,
                    c: [0.0, 1.0, 0.0],
                    r0: [0.0, 1.5, 0.0],
                    r1: [0.0, 0.5, 0.0],
                },
            ),
        ];
        let bones = vec![
            Bone {
                tail: BoneTail::Bone(1),
                movable: true,
                ..bone("センター")
            },
            Bone {
                parent: 0,
                level: 1,
                tail: BoneTail::Offset([0.0, 1.0, 0.0]),
                inherit: Inherit::Rotate {
                    parent: 0,
                    power: -0.5,
                },
                fixed_axis: Some([1.0, 0.0, 0.0]),
                ..bone("腕")
            },
            Bone {
                parent: 1,
                inherit: Inherit::Both {
                    parent: 1,
                    power: 1.0,
                },
                inherit_local: true,
                local_axis: Some(LocalAxis {
                    x: [1.0, 0.0, 0.0],
                    z: [0.0, 0.0, -1.0],
                }),
                after_physics: true,
                external_parent: Some(7),
                visible: false,
                ..bone("ひじ")
            },
            Bone {
                rotatable: false,
                operational: false,
                inherit: Inherit::Translate {
                    parent: 2,
                    power: 0.25,
                },
                ik: Some(Ik {
                    target: 2,
                    loops: 40,
                    limit: 2.0,
                    links: vec![
                        IkLink {
                            bone: 1,
                            limit: Some(([-PI, 0.0, 0.0], [-0.5, 0.0, 0.0])),
                        },
                        IkLink {
                            bone: 0,
                            limit: None,
                        },
                    ],
                }),
                ..bone("腕IK")
            },
        ];
        let morphs = vec![
            Morph {
                name: "まとめ".to_owned(),
                name_en: "all".to_owned(),
                panel: Panel::Other,
                offsets: MorphOffsets::Group(vec![
                    GroupOffset {
                        morph: 1,
                        factor: 0.5,
                    },
                    GroupOffset {
                        morph: 4,
                        factor: 1.0,
                    },
                ]),
            },
            Morph {
                name: "あ".to_owned(),
                name_en: "a".to_owned(),
                panel: Panel::Mouth,
                offsets: MorphOffsets::Vertex(vec![VertexOffset {
                    vertex: 3,
                    offset: [0.0, -0.25, 0.0],
                }]),
            },
            Morph {
                name: "腕上げ".to_owned(),
                name_en: "raise".to_owned(),
                panel: Panel::Other,
                offsets: MorphOffsets::Bone(vec![BoneOffset {
                    bone: 1,
                    translation: [0.0, 0.5, 0.0],
                    rotation: [0.0, 0.0, 0.70710677, 0.70710677],
                }]),
            },
            Morph {
                name: "UVずらし".to_owned(),
                name_en: "uv".to_owned(),
                panel: Panel::Eye,
                offsets: MorphOffsets::Uv {
                    channel: 0,
                    offsets: vec![UvOffset {
                        vertex: 0,
                        offset: [0.125, 0.0, 0.0, 0.0],
                    }],
                },
            },
            Morph {
                name: "追加UV".to_owned(),
                name_en: "uv1".to_owned(),
                panel: Panel::Eyebrow,
                offsets: MorphOffsets::Uv {
                    channel: 1,
                    offsets: vec![UvOffset {
                        vertex: 2,
                        offset: [0.0, 0.0, 1.0, 0.0],
                    }],
                },
            },
            Morph {
                name: "赤".to_owned(),
                name_en: "red".to_owned(),
                panel: Panel::System,
                offsets: MorphOffsets::Material(vec![
                    MaterialOffset {
                        diffuse: [1.0, 0.0, 0.0, 1.0],
                        ..MaterialOffset::identity(0, MaterialOperation::Multiply)
                    },
                    MaterialOffset::identity(-1, MaterialOperation::Add),
                ]),
            },
        ];
        Model {
            info: ModelInfo {
                name: "テスト".to_owned(),
                name_en: "test".to_owned(),
                comment: "一行目\r\n二行目".to_owned(),
                comment_en: "line".to_owned(),
            },
            vertices,
            faces: vec![0, 1, 2, 1, 2, 3],
            textures: vec!["tex\\body.png".to_owned(), "toon.bmp".to_owned()],
            materials: vec![
                Material {
                    name: "体".to_owned(),
                    name_en: "body".to_owned(),
                    flags: MaterialFlags::DOUBLE_SIDED | MaterialFlags::EDGE,
                    texture: 0,
                    sphere: 0,
                    sphere_mode: SphereMode::SubTexture,
                    toon: ToonMode::Texture(1),
                    memo: "memo".to_owned(),
                    face_count: 3,
                    ..Material::default()
                },
                Material {
                    name: "顔".to_owned(),
                    toon: ToonMode::System(3),
                    face_count: 3,
                    ..Material::default()
                },
            ],
            bones,
            morphs,
            frames: vec![
                Frame {
                    name: "Root".to_owned(),
                    name_en: "Root".to_owned(),
                    special: true,
                    items: vec![FrameItem::Bone(0)],
                },
                Frame {
                    name: "表情".to_owned(),
                    name_en: "Exp".to_owned(),
                    special: true,
                    items: vec![FrameItem::Morph(1), FrameItem::Morph(0)],
                },
                Frame {
                    name: "腕".to_owned(),
                    name_en: "arm".to_owned(),
                    special: false,
                    items: vec![FrameItem::Bone(1), FrameItem::Bone(3)],
                },
            ],
            rigids: vec![
                Rigid {
                    name: "頭".to_owned(),
                    bone: 0,
                    group: 3,
                    collision_mask: 0xFFF7,
                    shape: RigidShape::Capsule,
                    size: [0.5, 2.0, 0.0],
                    rotation: [0.0, PI / 2.0, 0.0],
                    physics: RigidPhysics::DynamicWithBone,
                    ..Rigid::default()
                },
                Rigid {
                    name: "髪".to_owned(),
                    ..Rigid::default()
                },
            ],
            joints: vec![Joint {
                name: "首".to_owned(),
                rigid_a: 0,
                rigid_b: 1,
                position_min: [-1.0, 0.0, 0.0],
                rotation_max: [0.5, 0.5, 0.5],
                position_spring: [100.0, 0.0, 0.0],
                ..Joint::default()
            }],
            ..Model::default()
        }
    }

    // Perform Copy test
    #[test]
    fn copy_test() {
        let model = full_model();
        for encode in [Encode::Utf16Le, Encode::Utf8] {
            let copy = round_trip(&model, encode);
            assert_eq!(copy.status.version, 2.0);
            assert_eq!(copy.status.encode, encode);
            assert_eq!(copy.status.additional_uv, 1);
            assert_same(&copy, &model);
        }
    }

    #[test]
    fn staged_reader_matches_the_whole_model() {
        let model = full_model();
        let bytes = write_model(Vec::new(), &model, Encode::Utf16Le).unwrap();
        let stage = ModelInfoStage::new(Cursor::new(bytes)).unwrap();
        assert_eq!(stage.status().bone_index, crate::status::IndexKinds::I8);
        let (info, ns) = stage.read().unwrap();
        assert_eq!(info, model.info);
        let (vertices, ns) = ns.read().unwrap();
        assert_eq!(vertices, model.vertices);
        let (faces, ns) = ns.read().unwrap();
        assert_eq!(faces, model.faces);
        let (textures, ns) = ns.read().unwrap();
        assert_eq!(textures, model.textures);
        let (materials, ns) = ns.read().unwrap();
        assert_eq!(materials, model.materials);
        let (bones, ns) = ns.read().unwrap();
        assert_eq!(bones, model.bones);
        let (morphs, ns) = ns.read().unwrap();
        assert_eq!(morphs, model.morphs);
        let (frames, ns) = ns.read().unwrap();
        assert_eq!(frames, model.frames);
        let (rigids, ns) = ns.read().unwrap();
        assert_eq!(rigids, model.rigids);
        let (joints, ns) = ns.read().unwrap();
        assert_eq!(joints, model.joints);
        assert!(ns.is_none());
    }

    #[test]
    fn version_21_sections_survive() {
        let mut model = full_model();
        model.vertices.push(vertex(
            4.0,
            VertexWeight::QDEF {
                bones: [3, 2, 1, 0],
                weights: [0.25; 4],
            },
        ));
        model.morphs.push(Morph {
            name: "切替".to_owned(),
            name_en: "flip".to_owned(),
            panel: Panel::Other,
            offsets: MorphOffsets::Flip(vec![GroupOffset {
                morph: 1,
                factor: 1.0,
            }]),
        });
        model.morphs.push(Morph {
            name: "衝撃".to_owned(),
            name_en: "impulse".to_owned(),
            panel: Panel::Other,
            offsets: MorphOffsets::Impulse(vec![ImpulseOffset {
                rigid: 1,
                local: true,
                velocity: [0.0, 1.0, 0.0],
                torque: [0.0, 0.0, 0.5],
            }]),
        });
        model.joints.push(Joint {
            name: "蝶番".to_owned(),
            kind: JointKind::Hinge,
            rigid_a: 1,
            rigid_b: 0,
            ..Joint::default()
        });
        model.soft_bodies.push(SoftBody {
            name: "布".to_owned(),
            name_en: "cloth".to_owned(),
            shape: SoftBodyShape::Rope,
            material: 1,
            group: 2,
            collision_mask: 0x00FF,
            flags: SoftBodyFlags::B_LINK | SoftBodyFlags::LINK_CROSSING,
            b_link_distance: 2,
            clusters: 4,
            mass: 1.5,
            margin: 0.05,
            aero_model: AeroModel::FOneSided,
            config: [0.5; 12],
            cluster: [0.25; 6],
            iteration: [1, 2, 3, 4],
            stiffness: [1.0, 0.5, 0.0],
            anchors: vec![SoftBodyAnchor {
                rigid: 1,
                vertex: 4,
                near_mode: true,
            }],
            pins: vec![0, 4],
        });
        assert!(model.requires_v21());
        let copy = round_trip(&model, Encode::Utf16Le);
        assert_eq!(copy.status.version, 2.1);
        assert_same(&copy, &model);
    }

    #[test]
    fn builder_collects_sections() {
        let model = full_model();
        let mut writer = crate::writer::Writer::new(Vec::new(), Encode::Utf8);
        writer.set_model_info(&model.info);
        writer.set_additional_uv(1).unwrap();
        writer.add_vertices(&model.vertices);
        writer.add_faces(&model.faces);
        writer.add_textures(&model.textures);
        writer.add_materials(&model.materials);
        writer.add_bones(&model.bones);
        writer.add_morphs(&model.morphs);
        writer.add_frames(&model.frames);
        writer.add_rigid_bodies(&model.rigids);
        writer.add_joints(&model.joints);
        writer.add_soft_bodies(&model.soft_bodies);
        writer.request_v21();
        let copy = read_model(Cursor::new(writer.write().unwrap())).unwrap();
        assert_eq!(copy.status.version, 2.1);
        assert_same(&copy, &model);
        assert_eq!(copy.bone_by_name("腕"), Some(1));
        assert_eq!(copy.bone_by_name("missing"), None);

        let mut writer = crate::writer::Writer::new(Vec::new(), Encode::Utf8);
        assert!(writer.set_additional_uv(5).is_err());
    }

    #[test]
    fn grown_uv_channels_are_written() {
        let mut model = round_trip(&full_model(), Encode::Utf16Le);
        assert_eq!(model.status.additional_uv, 1);
        model.vertices[2].extra_uv.push([0.5, 0.25, 0.0, 1.0]);
        let copy = round_trip(&model, Encode::Utf16Le);
        assert_eq!(copy.status.additional_uv, 2);
        assert_eq!(copy.vertices[2].extra_uv[1], [0.5, 0.25, 0.0, 1.0]);
        assert_eq!(copy.vertices[0].extra_uv[1], [0.0; 4]);
    }

    #[test]
    fn five_uv_channels_are_rejected() {
        let mut model = full_model();
        model.vertices[0].extra_uv = vec![[0.0; 4]; 5];
        assert!(matches!(
            write_model(Vec::new(), &model, Encode::Utf8),
            Err(Error::MalformedInput { .. })
        ));
    }

    #[test]
    fn minimal_model() {
        let model = Model {
            vertices: vec![Vertex::default(); 3],
            faces: vec![0, 1, 2],
            materials: vec![Material {
                face_count: 3,
                ..Material::default()
            }],
            bones: vec![Bone::default()],
            ..Model::default()
        };
        let copy = round_trip(&model, Encode::Utf16Le);
        assert_eq!(copy.vertices.len(), 3);
        assert_eq!(copy.faces.len(), 3);
        assert_eq!(copy.materials.len(), 1);
        assert_eq!(copy.materials[0].face_count, 3);
    }

    #[test]
    fn truncated_stream_is_malformed() {
        let mut bytes = write_model(Vec::new(), &full_model(), Encode::Utf8).unwrap();
        bytes.truncate(bytes.len() - 7);
        assert!(matches!(
            read_model(Cursor::new(bytes)),
            Err(Error::MalformedInput { .. })
        ));
    }

    #[test]
    fn index_overflow_aborts_the_write() {
        let mut model = full_model();
        model.vertices[0].weight = VertexWeight::BDEF1(200);
        assert!(matches!(
            write_model(Vec::new(), &model, Encode::Utf8),
            Err(Error::IndexOverflow { .. })
        ));
    }

    #[test]
    fn legacy_file_upgrades_then_saves_as_pmx() {
        let upgraded = read_model(Cursor::new(sample_pmd(true))).unwrap();
        assert_eq!(upgraded.status.kind, FormatKind::Pmd);
        let copy = round_trip(&upgraded, Encode::Utf16Le);
        assert_eq!(copy.status.kind, FormatKind::Pmx);
        assert_same(&copy, &upgraded);
    }

    #[derive(Default)]
    struct Capture(Option<SceneDescription>);

    impl SceneWriter for Capture {
        fn write_scene(&mut self, scene: SceneDescription) -> Result<()> {
            self.0 = Some(scene);
            Ok(())
        }
    }

    #[test]
    fn export_import_export_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tex")).unwrap();
        fs::write(dir.path().join("tex").join("body.png"), b"png").unwrap();
        let options = Options::default();

        let first = dir.path().join("model.pmx");
        export_model(&leg_scene(), &first, &options).unwrap();
        let mut capture = Capture::default();
        let report = import_model(&first, &mut capture, &options).unwrap();
        assert!(report.is_empty(), "{}", report);

        let again = dir.path().join("again.pmx");
        export_model(&capture.0.unwrap(), &again, &options).unwrap();

        let a = load_model(&first).unwrap();
        let b = load_model(&again).unwrap();
        assert_eq!(a.bones, b.bones);
        assert_eq!(a.vertices, b.vertices);
        assert_eq!(a.faces, b.faces);
        assert_eq!(a.textures, b.textures);
        assert_eq!(a.materials, b.materials);
        assert_eq!(a.morphs, b.morphs);
        assert_eq!(a.frames, b.frames);
    }
}
