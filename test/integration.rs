// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::StudyFixture;

use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use simple_test_case::test_case;
use std::{fs::read_to_string, sync::atomic::AtomicBool};
use studytree::{
    command::{
        Command, CommandDto, CommandError, CreateArea, CreateBindingConstraint, CreateLink,
        CreateRenewablesCluster, CreateShortTermStorage, MatrixPayload, RemoveArea, RemoveCluster,
        ReplaceMatrix, UpdateBindingConstraint, UpdateConfig,
    },
    matrix::{Matrix, MatrixRepository},
    study::config::{Operator, StudyConfig},
    tree::{path::Depth, TreeError},
    variant::{apply_all, generate, generate_with, VariantError},
};

fn storage(area: &str, name: &str) -> CreateShortTermStorage {
    CreateShortTermStorage {
        area_id: area.into(),
        storage_name: name.into(),
        ..CreateShortTermStorage::default()
    }
}

#[test]
fn record_write_then_read() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let study = fixture.open()?;

    let ui = json!({"ui": {"x": 12, "y": -4, "color_r": 0}});
    study.set("input/areas/fr/ui", ui.clone())?;
    assert_eq!(study.get("input/areas/fr/ui", Depth::Unbounded)?, ui);

    study.set("input/areas/fr/ui/ui/x", json!(30))?;
    assert_eq!(study.get("input/areas/fr/ui/ui/x", Depth::Unbounded)?, json!(30));
    assert_eq!(study.get("input/areas/fr/ui/ui/y", Depth::Unbounded)?, json!(-4));

    Ok(())
}

#[test]
fn boolean_written_as_literal() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let study = fixture.open()?;

    study.set("settings/generaldata/general/year-by-year", json!(true))?;
    let text = read_to_string(fixture.root().join("settings/generaldata.ini"))?;
    assert!(text.contains("year-by-year = true\n"));
    assert_eq!(
        study.get("settings/generaldata/general/year-by-year", Depth::Unbounded)?,
        json!(true)
    );

    Ok(())
}

#[test]
fn shallow_reads() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let study = fixture.open()?;

    assert_eq!(study.get("", Depth::Limited(0))?, json!({}));
    assert_eq!(study.get("input/areas", Depth::Limited(0))?, json!({}));

    let top = study.get("", Depth::Limited(1))?;
    assert_eq!(top["study"], json!({}));
    assert_eq!(top["input"], json!({}));
    assert_eq!(top["user"], json!({}));

    let listing = study.get("input/thermal/clusters/fr/list", Depth::Limited(1))?;
    assert_eq!(listing, json!({"gas": {}}));

    Ok(())
}

#[test]
fn leaves_read_as_references() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let study = fixture.open()?;

    assert_eq!(
        study.get("input/load/series/load_fr", Depth::Unbounded)?,
        json!("file://input/load/series/load_fr.txt")
    );
    assert_eq!(
        study.get("user/notes.md", Depth::Unbounded)?,
        json!("file://user/notes.md")
    );
    assert_eq!(
        study.fetch_matrix("file://input/load/series/load_fr.txt")?,
        Matrix::new(vec![vec![1.0], vec![2.0], vec![3.0]])?
    );
    assert_eq!(study.fetch_bytes("file://user/notes.md")?, b"keep me\n".to_vec());
    assert!(matches!(
        study.fetch_bytes("file://../outside.txt"),
        Err(TreeError::Reference(_))
    ));

    Ok(())
}

#[test]
fn selections() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let study = fixture.open()?;

    let both = study.get("input/areas/fr,de/optimization/filtering", Depth::Unbounded)?;
    assert_eq!(
        both,
        json!({
            "fr": {"filter-synthesis": "hourly, annual", "filter-year-by-year": "annual"},
            "de": {"filter-synthesis": "hourly, annual", "filter-year-by-year": "annual"},
        })
    );
    assert!(matches!(
        study.get("input/areas/*", Depth::Unbounded),
        Err(TreeError::HeterogeneousSelection { .. })
    ));
    assert!(matches!(
        study.get("input/areas/es", Depth::Unbounded),
        Err(TreeError::UnknownChild { .. })
    ));

    Ok(())
}

#[test]
fn scanned_config_matches_value_tree_config() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let study = fixture.open()?;

    let scanned = StudyConfig::scan(fixture.root())?;
    let tree = study.get("", Depth::Unbounded)?;
    let rebuilt = StudyConfig::from_tree_value(fixture.root(), &tree)?;

    assert_eq!(rebuilt, scanned);
    assert_eq!(scanned.area_names(), vec!["de", "fr"]);
    assert!(scanned.has_link("fr", "de"));
    assert_eq!(scanned.outputs().len(), 1);

    Ok(())
}

#[test]
fn replace_matrix_is_idempotent() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let mut study = fixture.open()?;
    let command = Command::ReplaceMatrix(ReplaceMatrix {
        target: "input/load/series/load_fr".into(),
        matrix: MatrixPayload::Inline(vec![vec![4.0], vec![5.0]]),
    });

    let (first, _) = command.apply(&mut study);
    let after_first = study.get("input/load/series/load_fr", Depth::Unbounded)?;
    let (second, _) = command.apply(&mut study);
    let after_second = study.get("input/load/series/load_fr", Depth::Unbounded)?;

    assert!(first.status && second.status);
    assert_eq!(after_first, after_second);
    assert_eq!(fixture.store().len(), 1);
    assert!(!fixture.root().join("input/load/series/load_fr.txt").exists());

    Ok(())
}

#[test]
fn failed_precondition_leaves_study_untouched() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let mut study = fixture.open()?;
    let before = study.get("", Depth::Unbounded)?;

    let command = Command::CreateLink(CreateLink {
        area1: "fr".into(),
        area2: "atlantis".into(),
        ..CreateLink::default()
    });
    let (output, extra) = command.apply(&mut study);

    assert!(!output.status);
    assert!(output.message.contains("atlantis"));
    assert!(extra.is_empty());
    assert_eq!(study.get("", Depth::Unbounded)?, before);

    Ok(())
}

#[test]
fn rejected_parameters_leave_no_unit_behind() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let mut study = fixture.open()?;
    let before = study.get("", Depth::Unbounded)?;

    let mut parameters = Map::new();
    parameters.insert("efficiency".into(), json!("high"));
    let invalid = Command::CreateShortTermStorage(CreateShortTermStorage {
        parameters,
        ..storage("fr", "sts1")
    });
    let (output, _) = invalid.apply(&mut study);
    assert!(!output.status);
    assert!(output.message.contains("efficiency"));
    assert!(study.config().area("fr")?.st_storages.is_empty());
    assert_eq!(study.get("", Depth::Unbounded)?, before);

    let (retry, extra) = Command::CreateShortTermStorage(storage("fr", "sts1")).apply(&mut study);
    assert!(retry.status, "{}", retry.message);
    assert_eq!(extra.get("id"), Some(&json!("sts1")));
    assert_eq!(study.config().area("fr")?.st_storages, vec!["sts1".to_string()]);

    Ok(())
}

#[test]
fn rejected_link_properties_leave_no_link_behind() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let mut study = fixture.open()?;

    let mut parameters = Map::new();
    parameters.insert("hurdles-cost".into(), json!("sometimes"));
    let invalid = Command::CreateLink(CreateLink {
        area1: "fr".into(),
        area2: "it".into(),
        parameters,
        ..CreateLink::default()
    });
    let (created, _) = Command::CreateArea(CreateArea {
        area_name: "IT".into(),
    })
    .apply(&mut study);
    assert!(created.status);

    let (output, _) = invalid.apply(&mut study);
    assert!(!output.status);
    assert!(!study.config().has_link("fr", "it"));

    Ok(())
}

#[test]
fn study_round_trip() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let study = fixture.open()?;
    let before = study.get("", Depth::Unbounded)?;

    study.set("", before.clone())?;
    let reopened = fixture.open()?;
    assert_eq!(reopened.get("", Depth::Unbounded)?, before);

    Ok(())
}

#[test]
fn create_area_and_storage_end_to_end() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let mut study = fixture.open()?;

    let injection = fixture.store().store(&Matrix::filled(8760, &[0.5]))?;
    let reference = format!("matrix://{injection}");
    let commands = vec![
        Command::CreateArea(CreateArea {
            area_name: "IT".into(),
        }),
        Command::CreateShortTermStorage(CreateShortTermStorage {
            pmax_injection: Some(MatrixPayload::Reference(reference.clone())),
            ..storage("it", "sts1")
        }),
    ];

    let report = apply_all(&mut study, &commands, &AtomicBool::new(false), |_| {});
    assert!(report.iter().all(|entry| entry.output.status));
    assert_eq!(report[0].extra.get("id"), Some(&json!("it")));

    assert!(study.config().has_area("it"));
    assert_eq!(
        study.get("input/st-storage/clusters/it/list", Depth::Unbounded)?,
        json!({"sts1": {"name": "sts1"}})
    );
    assert_eq!(
        study.get("input/st-storage/series/it/sts1/pmax_injection", Depth::Unbounded)?,
        json!(reference)
    );
    let curve = study.get("input/st-storage/series/it/sts1/upper_rule_curve", Depth::Unbounded)?;
    let curve = curve.as_str().unwrap_or_default();
    assert_eq!(study.fetch_matrix(curve)?, Matrix::filled(8760, &[1.0]));

    let list = read_to_string(fixture.root().join("input/areas/list.txt"))?;
    assert_eq!(list, "FR\nDE\nIT\n");

    // INVARIANT: A rescan sees exactly what the commands built in memory.
    assert_eq!(&StudyConfig::scan(fixture.root())?, study.config());

    Ok(())
}

#[test]
fn remove_area_cleans_up() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let mut study = fixture.open()?;

    let (output, _) = Command::RemoveArea(RemoveArea { id: "fr".into() }).apply(&mut study);
    assert!(output.status, "{}", output.message);

    assert!(!study.config().has_area("fr"));
    assert!(!study.config().has_link("de", "fr"));
    assert!(!fixture.root().join("input/areas/fr").exists());
    assert!(!fixture.root().join("input/thermal/clusters/fr").exists());
    assert_eq!(read_to_string(fixture.root().join("input/areas/list.txt"))?, "DE\n");
    assert_eq!(
        study.get("input/links/de/properties", Depth::Unbounded)?,
        json!({})
    );
    assert_eq!(&StudyConfig::scan(fixture.root())?, study.config());

    Ok(())
}

#[test]
fn diff_reproduces_other_command() -> Result<()> {
    let left = StudyFixture::new(870)?;
    let right = StudyFixture::new(870)?;
    let mut left_study = left.open()?;
    let mut right_study = right.open()?;

    let mut parameters = Map::new();
    parameters.insert("efficiency".into(), json!(0.9));
    parameters.insert("reservoircapacity".into(), json!(120.0));
    let mine = Command::CreateShortTermStorage(storage("fr", "Battery"));
    let theirs = Command::CreateShortTermStorage(CreateShortTermStorage {
        parameters,
        inflows: Some(MatrixPayload::Inline(vec![vec![0.25]; 8760])),
        ..storage("fr", "Battery")
    });

    assert!(mine.matches(&theirs, false));
    assert!(!mine.matches(&theirs, true));

    let mut commands = vec![mine.clone()];
    commands.extend(mine.diff_against(&theirs)?);
    let report = apply_all(&mut left_study, &commands, &AtomicBool::new(false), |_| {});
    assert!(report.iter().all(|entry| entry.output.status));

    let (output, _) = theirs.apply(&mut right_study);
    assert!(output.status, "{}", output.message);

    assert_eq!(
        left_study.get("input/st-storage", Depth::Unbounded)?,
        right_study.get("input/st-storage", Depth::Unbounded)?
    );
    assert_eq!(
        left_study.config().metadata().areas,
        right_study.config().metadata().areas
    );

    Ok(())
}

#[test]
fn generate_continues_past_failures() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let (_guard, target) = fixture.variant_path("variant")?;
    let commands = vec![
        Command::RemoveCluster(RemoveCluster {
            area_id: "fr".into(),
            cluster_id: "coal".into(),
        }),
        Command::CreateArea(CreateArea {
            area_name: "ES".into(),
        }),
    ];

    let generation = generate(fixture.root(), &target, &commands, fixture.context())?;

    assert_eq!(generation.report.len(), 2);
    assert!(!generation.report[0].output.status);
    assert!(generation.report[1].output.status);
    assert!(!generation.succeeded());
    assert!(!generation.cancelled);
    assert!(generation.study.config().has_area("es"));
    assert!(target.join("user/notes.md").exists());

    // INVARIANT: Base study is never touched.
    assert!(!fixture.root().join("input/areas/es").exists());
    assert_eq!(read_to_string(fixture.root().join("input/areas/list.txt"))?, "FR\nDE\n");

    Ok(())
}

#[test]
fn generate_refuses_existing_target() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let other = StudyFixture::new(870)?;

    let result = generate(fixture.root(), other.root(), &[], fixture.context());
    assert!(matches!(result, Err(VariantError::TargetExists(_))));

    Ok(())
}

#[test]
fn generate_stops_when_cancelled() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let (_guard, target) = fixture.variant_path("variant")?;
    let commands = vec![
        Command::CreateArea(CreateArea {
            area_name: "ES".into(),
        }),
        Command::CreateArea(CreateArea {
            area_name: "PT".into(),
        }),
    ];

    let cancel = AtomicBool::new(false);
    let generation = generate_with(
        fixture.root(),
        &target,
        &commands,
        fixture.context(),
        &cancel,
        |_| cancel.store(true, std::sync::atomic::Ordering::Relaxed),
    )?;

    assert!(generation.cancelled);
    assert_eq!(generation.report.len(), 1);
    assert!(!generation.study.config().has_area("pt"));

    Ok(())
}

#[test_case(800, Command::CreateRenewablesCluster(CreateRenewablesCluster {
    area_id: "fr".into(),
    cluster_name: "solar".into(),
    parameters: Map::new(),
}); "renewables before 810")]
#[test_case(850, Command::CreateShortTermStorage(CreateShortTermStorage {
    area_id: "fr".into(),
    storage_name: "battery".into(),
    ..CreateShortTermStorage::default()
}); "storage before 860")]
#[test_case(860, Command::CreateShortTermStorage(CreateShortTermStorage {
    area_id: "fr".into(),
    storage_name: "battery".into(),
    parameters: Map::from_iter([("enabled".to_string(), json!(false))]),
    ..CreateShortTermStorage::default()
}); "storage enabled flag before 880")]
#[test_case(860, Command::CreateBindingConstraint(CreateBindingConstraint {
    name: "cap".into(),
    group: Some("north".into()),
    ..CreateBindingConstraint::default()
}); "constraint group before 870")]
#[test_case(870, Command::CreateBindingConstraint(CreateBindingConstraint {
    name: "cap".into(),
    values: Some(MatrixPayload::Inline(vec![vec![0.0; 3]])),
    ..CreateBindingConstraint::default()
}); "constraint values from 870")]
#[test]
fn version_gated_commands_fail(version: u32, command: Command) -> Result<()> {
    let fixture = StudyFixture::new(version)?;
    let mut study = fixture.open()?;
    let before = study.get("", Depth::Unbounded)?;

    let (output, _) = command.apply(&mut study);
    assert!(!output.status);
    pretty_assertions::assert_eq!(study.get("", Depth::Unbounded)?, before);

    Ok(())
}

#[test]
fn version_gated_layout() -> Result<()> {
    let fixture = StudyFixture::new(800)?;
    let study = fixture.open()?;

    assert!(matches!(
        study.get("input/renewables", Depth::Unbounded),
        Err(TreeError::UnknownChild { .. })
    ));
    assert_eq!(
        study.get("input/links/de/fr", Depth::Unbounded)?,
        json!("file://input/links/de/fr.txt")
    );
    assert!(matches!(
        study.get("input/links/de/capacities", Depth::Unbounded),
        Err(TreeError::UnknownChild { .. })
    ));

    Ok(())
}

#[test]
fn binding_constraint_lifecycle() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let mut study = fixture.open()?;

    let create = Command::CreateBindingConstraint(CreateBindingConstraint {
        name: "Export cap".into(),
        operator: Operator::Both,
        coeffs: Map::from_iter([
            ("de%fr".to_string(), json!(1.0)),
            ("fr.gas".to_string(), json!(-1.0)),
        ]),
        ..CreateBindingConstraint::default()
    });
    let (output, _) = create.apply(&mut study);
    assert!(output.status, "{}", output.message);
    assert_eq!(
        study.get("input/bindingconstraints/bindingconstraints/0", Depth::Unbounded)?,
        json!({
            "name": "Export cap",
            "id": "export cap",
            "enabled": true,
            "type": "hourly",
            "operator": "both",
            "comments": "",
            "group": "default",
            "de%fr": 1.0,
            "fr.gas": -1.0,
        })
    );
    assert!(study
        .get("input/bindingconstraints/export cap_lt", Depth::Unbounded)?
        .as_str()
        .is_some_and(|reference| reference.starts_with("matrix://")));

    // INVARIANT: Referenced clusters cannot be removed.
    let (output, _) = Command::RemoveCluster(RemoveCluster {
        area_id: "fr".into(),
        cluster_id: "gas".into(),
    })
    .apply(&mut study);
    assert!(!output.status);

    let update = Command::UpdateBindingConstraint(UpdateBindingConstraint {
        id: "export cap".into(),
        operator: Some(Operator::Equal),
        coeffs: Some(Map::from_iter([("de%fr".to_string(), json!(2.0))])),
        ..UpdateBindingConstraint::default()
    });
    let (output, _) = update.apply(&mut study);
    assert!(output.status, "{}", output.message);
    assert!(!fixture.root().join("input/bindingconstraints/export cap_lt.txt.link").exists());
    assert!(fixture.root().join("input/bindingconstraints/export cap_eq.txt.link").exists());
    let section = study.get("input/bindingconstraints/bindingconstraints/0", Depth::Unbounded)?;
    assert_eq!(section["operator"], json!("equal"));
    assert_eq!(section.get("fr.gas"), None);
    assert_eq!(&StudyConfig::scan(fixture.root())?, study.config());

    let (output, _) = Command::RemoveBindingConstraint(
        studytree::command::RemoveBindingConstraint {
            id: "export cap".into(),
        },
    )
    .apply(&mut study);
    assert!(output.status, "{}", output.message);
    assert!(study.config().bindings().is_empty());
    assert!(!fixture.root().join("input/bindingconstraints/export cap_eq.txt.link").exists());

    Ok(())
}

#[test]
fn update_config_rescans_structure() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let mut study = fixture.open()?;

    let command = Command::UpdateConfig(UpdateConfig {
        target: "input/thermal/clusters/fr/list/oil".into(),
        data: json!({"name": "oil", "unitcount": 1}),
    });
    let (output, _) = command.apply(&mut study);
    assert!(output.status, "{}", output.message);
    assert_eq!(study.config().clusters_of("fr", studytree::study::config::ClusterKind::Thermal)?, ["gas", "oil"]);

    let wrong = Command::UpdateConfig(UpdateConfig {
        target: "input/load/series/load_fr".into(),
        data: json!({}),
    });
    assert!(!wrong.apply(&mut study).0.status);

    Ok(())
}

#[test]
fn command_log_wire_format() -> Result<()> {
    let raw = json!([
        {"kind": "create_area", "version": 1, "args": {"area_name": "IT"}},
        {"kind": "replace_matrix", "version": 1, "args": {
            "target": "input/load/series/load_it",
            "matrix": [[1.0], [2.0]],
        }},
    ]);
    let dtos: Vec<CommandDto> = serde_json::from_value(raw.clone())?;
    let commands = dtos.iter().map(Command::from_dto).collect::<Result<Vec<_>, _>>()?;
    assert_eq!(commands.len(), 2);

    let back = commands
        .iter()
        .map(Command::to_dto)
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(serde_json::to_value(back)?, raw);

    let unknown: CommandDto =
        serde_json::from_value(json!({"kind": "paint_area", "version": 1, "args": {}}))?;
    assert!(matches!(Command::from_dto(&unknown), Err(CommandError::UnknownKind(_))));

    let future: CommandDto =
        serde_json::from_value(json!({"kind": "create_area", "version": 9, "args": {"area_name": "IT"}}))?;
    assert!(matches!(
        Command::from_dto(&future),
        Err(CommandError::UnsupportedVersion { .. })
    ));

    Ok(())
}

#[test]
fn bucket_children_are_snapshotted() -> Result<()> {
    let fixture = StudyFixture::new(870)?;
    let study = fixture.open()?;

    let before = study.tree().get(&["user".to_string()], Depth::Unbounded)?;
    fixture.write("user/later.md", "new\n")?;
    let after = study.tree().get(&["user".to_string()], Depth::Unbounded)?;
    assert_eq!(before, after);

    let reopened = fixture.open()?;
    let fresh = reopened.get("user", Depth::Unbounded)?;
    assert_eq!(fresh["later.md"], Value::String("file://user/later.md".into()));
    assert_eq!(fixture.version(), 870);

    Ok(())
}
