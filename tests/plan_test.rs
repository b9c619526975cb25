use anyhow::Result;
use chrono::{TimeZone, Utc};
use std::str::FromStr;
use strum::IntoEnumIterator;
use workout_plan_lib::plan::{coerce_set_count, Error as PlanError};
use workout_plan_lib::progress::{build_progress_report, build_recap};
use workout_plan_lib::{
    load_config_util, parse_plan, save_config_util, Action, Config, ConfigError, EmptyReason,
    Intent, ProgressReport, Render, SetEntry, SetLog, Table, Units,
};

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn headers() -> Vec<String> {
    row(&["Allenamento", "Esercizio", "Serie", "Ripetizioni", "Recupero"])
}

fn log(id: i64, day: &str, exercise: &str, weight: &str, reps: u32, ymd: (i32, u32, u32)) -> SetLog {
    SetLog {
        id,
        user_id: 1,
        day: day.to_string(),
        exercise: exercise.to_string(),
        set_number: 1,
        weight: weight.to_string(),
        reps,
        timestamp: Utc.with_ymd_and_hms(ymd.0, ymd.1, ymd.2, 12, 0, 0).unwrap(),
    }
}

#[test]
fn test_serie_coercion() {
    assert_eq!(coerce_set_count("3"), 3);
    assert_eq!(coerce_set_count(" 4 "), 4);
    assert_eq!(coerce_set_count("3 set"), 3);
    assert_eq!(coerce_set_count("serie: 5x"), 5);
    assert_eq!(coerce_set_count("abc"), 1);
    assert_eq!(coerce_set_count(""), 1);
    assert_eq!(coerce_set_count("0"), 0);
    assert_eq!(coerce_set_count("99999999999"), u32::MAX);
    assert_eq!(coerce_set_count("99999999999 serie"), u32::MAX);
}

#[test]
fn test_parse_plan_preserves_order() -> Result<()> {
    let table = Table::new(
        headers(),
        vec![
            row(&["B", "Trazioni", "4", "8", "2'"]),
            row(&["A", "Panca", "3 set", "10", "90s"]),
            row(&["B", "Rematore", "abc", "12", "60s"]),
            row(&["A", "Croci", "3", "12-15", "60s"]),
        ],
    );

    let plan = parse_plan(&table)?;
    assert_eq!(plan.day_names(), vec!["B".to_string(), "A".to_string()]);

    let b: Vec<(&str, u32)> = plan.days[0]
        .exercises
        .iter()
        .map(|e| (e.name.as_str(), e.sets))
        .collect();
    assert_eq!(b, vec![("Trazioni", 4), ("Rematore", 1)]);

    let a = &plan.days[1].exercises;
    assert_eq!(a[0].name, "Panca");
    assert_eq!(a[0].sets, 3);
    assert_eq!(a[1].reps, "12-15");
    assert_eq!(a[1].rest, "60s");
    Ok(())
}

#[test]
fn test_parse_plan_keeps_repeated_exercise_rows_apart() -> Result<()> {
    let table = Table::new(
        headers(),
        vec![
            row(&["A", "Panca", "3", "10", "90s"]),
            row(&["A", "Croci", "2", "12", "60s"]),
            row(&["A", "Panca", "2", "6", "2'"]),
        ],
    );

    let plan = parse_plan(&table)?;
    let a: Vec<(&str, u32, &str)> = plan.days[0]
        .exercises
        .iter()
        .map(|e| (e.name.as_str(), e.sets, e.reps.as_str()))
        .collect();
    assert_eq!(
        a,
        vec![("Panca", 3, "10"), ("Croci", 2, "12"), ("Panca", 2, "6")]
    );
    assert_eq!(plan.total_exercises(), 3);
    Ok(())
}

#[test]
fn test_parse_plan_ignores_extra_columns_and_column_order() -> Result<()> {
    let table = Table::new(
        row(&["Note", "Recupero", "Esercizio", "Allenamento", "Ripetizioni", "Serie"]),
        vec![row(&["easy", "60s", "Squat", "Giorno 1", "5", "5"])],
    );

    let plan = parse_plan(&table)?;
    let squat = &plan.days[0].exercises[0];
    assert_eq!(plan.days[0].name, "Giorno 1");
    assert_eq!(squat.name, "Squat");
    assert_eq!(squat.sets, 5);
    assert_eq!(squat.rest, "60s");
    Ok(())
}

#[test]
fn test_parse_plan_missing_columns() {
    let table = Table::new(row(&["Allenamento", "Esercizio", "Ripetizioni"]), vec![]);

    let err = parse_plan(&table).unwrap_err();
    assert_eq!(
        err,
        PlanError::MissingColumns(vec!["Serie".to_string(), "Recupero".to_string()])
    );
    assert_eq!(err.to_string(), "Missing required columns: Serie, Recupero");
}

#[test]
fn test_parse_plan_skips_incomplete_rows() -> Result<()> {
    let table = Table::new(
        headers(),
        vec![
            row(&["", "", "", "", ""]),
            row(&["A", "", "3", "10", "60s"]),
            row(&["", "Panca", "3", "10", "60s"]),
            row(&["A", "Panca"]),
        ],
    );

    let plan = parse_plan(&table)?;
    assert_eq!(plan.days.len(), 1);
    let panca = &plan.days[0].exercises[0];
    assert_eq!(panca.sets, 1);
    assert_eq!(panca.reps, "");
    assert_eq!(plan.total_exercises(), 1);
    Ok(())
}

#[test]
fn test_table_from_csv() -> Result<()> {
    let csv = "Allenamento,Esercizio,Serie,Ripetizioni,Recupero\n\
               Giorno 1,Panca piana,4,8-10,\"1'30\"\"\"\n\
               Giorno 1,Croci,3\n";

    let table = Table::from_csv_reader(csv.as_bytes())?;
    assert_eq!(table.headers, headers());
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0][4], "1'30\"");

    let plan = parse_plan(&table)?;
    assert_eq!(plan.days[0].exercises[1].name, "Croci");
    assert_eq!(plan.days[0].exercises[1].rest, "");
    Ok(())
}

#[test]
fn test_set_entry_parsing() {
    let entry = SetEntry::parse_line("  52,5   8 ").unwrap();
    assert_eq!(entry.weight, "52.5");
    assert_eq!(entry.reps, 8);

    let entry = SetEntry::parse("0", "12").unwrap();
    assert_eq!(entry.weight, "0");

    for bad in ["", "50", "50 10 1", "x 10", "50 x", "50 8.5", "inf 3", "NaN 3"] {
        assert!(SetEntry::parse_line(bad).is_err(), "{bad:?} should be rejected");
    }
}

#[test]
fn test_progress_report_follows_plan_order() -> Result<()> {
    let plan = parse_plan(&Table::new(
        headers(),
        vec![
            row(&["A", "Panca", "3", "10", "60s"]),
            row(&["A", "Croci", "3", "12", "60s"]),
            row(&["A", "Panca", "2", "6", "60s"]),
            row(&["B", "Squat", "3", "5", "2'"]),
        ],
    ))?;

    let logs = vec![
        log(1, "B", "Squat", "100", 5, (2024, 3, 2)),
        log(2, "A", "Croci", "12", 12, (2024, 3, 1)),
        log(3, "A", "Panca", "60", 10, (2024, 3, 1)),
        log(4, "A", "Panca", "62.5", 8, (2024, 2, 20)),
        log(5, "Old day", "Panca", "40", 10, (2024, 1, 1)),
    ];

    let days = match build_progress_report(Some(&plan), &logs) {
        ProgressReport::Days { days } => days,
        other => panic!("Expected days, got {other:?}"),
    };

    assert_eq!(
        days.iter().map(|d| d.day.as_str()).collect::<Vec<_>>(),
        vec!["A", "B"]
    );
    let a: Vec<&str> = days[0]
        .exercises
        .iter()
        .map(|e| e.exercise.as_str())
        .collect();
    assert_eq!(a, vec!["Panca", "Croci"]);

    let panca = &days[0].exercises[0];
    assert_eq!(panca.dates.len(), 2);
    assert!(panca.dates[0].date < panca.dates[1].date);
    assert_eq!(panca.dates[0].summary("kg"), "62.5kg × 8");
    Ok(())
}

#[test]
fn test_progress_report_empty_reasons() -> Result<()> {
    let plan = parse_plan(&Table::new(headers(), vec![row(&["A", "Panca", "3", "10", "60s"])]))?;

    assert_eq!(
        build_progress_report(None, &[log(1, "A", "Panca", "60", 10, (2024, 3, 1))]),
        ProgressReport::Empty {
            reason: EmptyReason::NoPlan
        }
    );
    assert_eq!(
        build_progress_report(Some(&plan), &[]),
        ProgressReport::Empty {
            reason: EmptyReason::NoLogs
        }
    );
    // Logs that match no plan day give an empty day list, not an empty report
    assert_eq!(
        build_progress_report(Some(&plan), &[log(1, "Z", "Panca", "60", 10, (2024, 3, 1))]),
        ProgressReport::Days { days: vec![] }
    );
    Ok(())
}

#[test]
fn test_recap_newest_dates_first() {
    let logs = vec![
        log(1, "A", "Panca", "60", 10, (2024, 3, 1)),
        log(2, "A", "Panca", "60", 9, (2024, 3, 1)),
        log(3, "A", "Panca", "65", 6, (2024, 3, 8)),
        log(4, "A", "Panca", "55", 12, (2024, 2, 22)),
    ];

    let recap = build_recap(&logs, 2);
    assert_eq!(recap.len(), 2);
    assert_eq!(recap[0].summary("lbs"), "65lbs × 6");
    assert_eq!(recap[1].summary("lbs"), "60lbs × 10 60lbs × 9");

    assert!(build_recap(&[], 5).is_empty());
}

#[test]
fn test_button_identifiers_round_trip() {
    for action in Action::iter() {
        let id = action.as_ref();
        assert_eq!(Action::from_str(id).ok(), Some(action), "{id}");
        assert_eq!(Intent::from_button(id), Some(Intent::from(action)));
    }

    assert_eq!(Intent::from_button("back:set"), Some(Intent::GoBack));
    assert_eq!(Intent::from_button("reset:execute"), Some(Intent::ResetAll));
    assert_eq!(
        Intent::from_button("day:Giorno 1"),
        Some(Intent::StartDay("Giorno 1".to_string()))
    );
    assert_eq!(Intent::from_button("launch:rocket"), None);
}

#[test]
fn test_render_json_shape() -> Result<()> {
    let value = serde_json::to_value(Render::DayComplete {
        day: "Giorno 1".to_string(),
    })?;
    assert_eq!(
        value,
        serde_json::json!({"type": "day_complete", "day": "Giorno 1"})
    );

    let value = serde_json::to_value(Render::menu())?;
    assert_eq!(value["actions"][0], "ImportPrompt");
    Ok(())
}

#[test]
fn test_config_save_and_load() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("config.toml");

    // First load writes the defaults
    let loaded = load_config_util(&path)?;
    assert_eq!(loaded, Config::default());
    assert!(path.exists());

    let mut config = Config::default();
    config.units = Units::Imperial;
    config.recap_dates = 3;
    config.default_user_id = 42;
    config.theme.header_color = "DarkBlue".to_string();
    save_config_util(&path, &config)?;

    let loaded = load_config_util(&path)?;
    assert_eq!(loaded, config);
    assert_eq!(loaded.units.weight_label(), "lbs");
    assert_eq!(loaded.header_color(), comfy_table::Color::DarkBlue);
    Ok(())
}

#[test]
fn test_config_rejects_zero_recap() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");

    let config = Config {
        recap_dates: 0,
        ..Default::default()
    };
    assert!(matches!(
        save_config_util(&path, &config),
        Err(ConfigError::InvalidRecapDates(0))
    ));

    std::fs::write(&path, "recap_dates = 0\n")?;
    assert!(matches!(
        load_config_util(&path),
        Err(ConfigError::InvalidRecapDates(0))
    ));

    // Missing keys fall back to defaults
    std::fs::write(&path, "units = \"imperial\"\n")?;
    let loaded = load_config_util(&path)?;
    assert_eq!(loaded.units, Units::Imperial);
    assert_eq!(loaded.recap_dates, Config::default().recap_dates);
    Ok(())
}
