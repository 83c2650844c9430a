//! Integration tests for the line-oriented shell.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use image::ImageFormat;
use papaya_detect::shell::{Command, EMPTY_HISTORY, RecordSummary, Shell, render_history};

use common::*;

#[test]
fn test_parse_commands() {
    assert_eq!(Command::parse("history"), Ok(Command::History));
    assert_eq!(
        Command::parse("detect  leaf.png"),
        Ok(Command::Detect(PathBuf::from("leaf.png")))
    );
    assert_eq!(
        Command::parse("login admin 123"),
        Ok(Command::Login {
            username: "admin".to_string(),
            password: "123".to_string()
        })
    );
    assert_eq!(Command::parse("exit"), Ok(Command::Quit));
    assert_eq!(Command::parse(""), Ok(Command::Home));
    assert!(Command::parse("login admin").is_err());
    assert!(Command::parse("detect").is_err());
    assert!(Command::parse("dance now").is_err());
}

#[test]
fn test_parse_keeps_spaces_in_arguments() {
    assert_eq!(
        Command::parse("detect /photos/kebun pepaya/buah 1.jpg"),
        Ok(Command::Detect(PathBuf::from("/photos/kebun pepaya/buah 1.jpg")))
    );
    assert_eq!(
        Command::parse("camera  frame 01.png "),
        Ok(Command::Camera(PathBuf::from("frame 01.png")))
    );
    assert_eq!(
        Command::parse("login salma kata sandi rahasia"),
        Ok(Command::Login {
            username: "salma".to_string(),
            password: "kata sandi rahasia".to_string()
        })
    );
}

#[tokio::test]
async fn test_detect_path_with_spaces() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("buah pepaya 1.png");
    test_image().save(&path)?;

    let pipeline = make_pipeline(Arc::new(FakeDetector::new(scenario_regions())), scenario_catalog());
    let mut shell = Shell::new(&pipeline, Session::with_default_admin(), 0.4);

    let script = format!("detect {}\n", path.display());
    let mut output = Vec::new();
    shell.run(script.as_bytes(), &mut output).await?;

    assert!(String::from_utf8(output)?.contains("Record 1 (upload 'buah pepaya 1.png')"));
    assert_eq!(shell.session().history().len(), 1);
    Ok(())
}

#[test]
fn test_empty_history_message() {
    assert_eq!(render_history(&HistoryStore::new()), format!("{}\n", EMPTY_HISTORY));
}

#[tokio::test]
async fn test_scripted_session() -> anyhow::Result<()> {
    // 1. Prepare an image on disk and an output directory
    let image_file = create_test_image_file(".png", ImageFormat::Png);
    let out_dir = tempfile::TempDir::new()?;

    let pipeline = make_pipeline(Arc::new(FakeDetector::new(scenario_regions())), scenario_catalog());
    let mut shell = Shell::new(&pipeline, Session::with_default_admin(), 0.4)
        .with_output_dir(out_dir.path().to_path_buf());

    // 2. Detect twice (one missing file), then show history
    let script = format!(
        "history\ndetect {path}\ndetect /no/such/file.png\ncamera {path}\nhistory\nquit\ndetect {path}\n",
        path = image_file.path().display()
    );
    let mut output = Vec::new();
    shell.run(script.as_bytes(), &mut output).await?;
    let output = String::from_utf8(output)?;

    // 3. Failed file is reported, commands after quit are ignored
    assert!(output.contains("Selamat Datang, Admin!"));
    assert!(output.contains(EMPTY_HISTORY));
    assert!(output.contains("Error:"));
    assert!(output.contains("**BlackSpot**: Fungal infection causing black lesions."));
    assert!(output.contains("**Anthracnose**: Info tidak tersedia"));
    assert!(output.contains("Record 2 (camera)"));
    assert_eq!(shell.session().history().len(), 2);

    // 4. Annotated images were written for both records
    assert!(out_dir.path().join("01_annotated.png").is_file());
    assert!(out_dir.path().join("02_annotated.png").is_file());
    Ok(())
}

#[tokio::test]
async fn test_login_disabled_without_user_db() -> anyhow::Result<()> {
    let pipeline = make_pipeline(Arc::new(FakeDetector::new(vec![])), scenario_catalog());
    let mut shell = Shell::new(&pipeline, Session::with_default_admin(), 0.4);

    let mut output = Vec::new();
    shell.run("login admin 123\n".as_bytes(), &mut output).await?;

    assert!(String::from_utf8(output)?.contains("Login is disabled"));
    Ok(())
}

#[test]
fn test_record_summary_serializes() -> anyhow::Result<()> {
    let pipeline = make_pipeline(Arc::new(FakeDetector::new(scenario_regions())), scenario_catalog());
    let record = pipeline.run(make_input("papaya.jpg"), 0.4)?;

    let json = serde_json::to_value(RecordSummary::new(1, &record)?)?;

    assert_eq!(json["index"], 1);
    assert_eq!(json["input"]["kind"], "upload");
    assert_eq!(json["input"]["file_name"], "papaya.jpg");
    assert_eq!(json["regions"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["explanations"].as_array().map(Vec::len), Some(2));
    Ok(())
}
