use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::db::UserDb;
use crate::history::HistoryStore;
use crate::input::InputImage;
use crate::models::{DetectedRegion, DetectionRecord, Explanation, InputSource};
use crate::pipeline::{DetectionPipeline, PipelineError};
use crate::session::{Session, SessionError};

pub const EMPTY_HISTORY: &str = "Belum ada riwayat deteksi.";

const HOME_TEXT: &str = "\
Aplikasi Deteksi Penyakit Buah Pepaya

Mendeteksi penyakit buah pepaya dari gambar menggunakan model YOLO11
(Presisi 0.694, Recall 0.651, mAP50 0.706).

  detect <path>   Deteksi penyakit dari gambar (JPEG/PNG)
  camera <path>   Deteksi dari foto kamera
  history         Riwayat deteksi
  login <username> <password>
  logout
  quit";

/// Machine-readable view of a record
#[derive(Debug, Serialize)]
pub struct RecordSummary<'a> {
    pub index: usize,
    pub input: &'a InputSource,
    pub detected_at: String,
    pub confidence_threshold: f32,
    pub width: u32,
    pub height: u32,
    pub regions: &'a [DetectedRegion],
    pub explanations: &'a [Explanation],
}

impl<'a> RecordSummary<'a> {
    /// `index` is 1-based, as shown in the history view
    pub fn new(index: usize, record: &'a DetectionRecord) -> anyhow::Result<Self> {
        Ok(Self {
            index,
            input: record.input(),
            detected_at: record
                .detected_at()
                .format(&time::format_description::well_known::Rfc3339)?,
            confidence_threshold: record.confidence_threshold(),
            width: record.source_image().width(),
            height: record.source_image().height(),
            regions: record.regions(),
            explanations: record.explanations(),
        })
    }
}

/// Text view of one record; `index` is 1-based
pub fn render_record(index: usize, record: &DetectionRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Record {} ({})", index, record.input());
    let _ = writeln!(
        out,
        "  {} region(s) at confidence >= {:.2}",
        record.regions().len(),
        record.confidence_threshold()
    );
    for region in record.regions() {
        let [x1, y1, x2, y2] = region.bbox.as_array();
        let _ = writeln!(
            out,
            "    {} {:.2} [{:.0}, {:.0}, {:.0}, {:.0}]",
            region.class_label, region.confidence, x1, y1, x2, y2
        );
    }
    if !record.explanations().is_empty() {
        let _ = writeln!(out, "  Penjelasan Penyakit Terdeteksi:");
        for explanation in record.explanations() {
            let _ = writeln!(out, "    {}", explanation);
        }
    }
    out
}

/// Text view of the whole history, oldest first
pub fn render_history(history: &HistoryStore) -> String {
    if history.is_empty() {
        return format!("{}\n", EMPTY_HISTORY);
    }
    history
        .list()
        .iter()
        .enumerate()
        .map(|(idx, record)| render_record(idx + 1, record))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the annotated image of a record as `NN_annotated.png`
pub fn save_annotated(dir: &Path, index: usize, record: &DetectionRecord) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    let path = dir.join(format!("{:02}_annotated.png", index));
    record
        .annotated_image()
        .save(&path)
        .with_context(|| format!("Failed to save annotated image {:?}", path))?;
    Ok(path)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Home,
    Detect(PathBuf),
    Camera(PathBuf),
    History,
    Login { username: String, password: String },
    Logout,
    Quit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Home => "home",
            Command::Detect(_) => "detect",
            Command::Camera(_) => "camera",
            Command::History => "history",
            Command::Login { .. } => "login",
            Command::Logout => "logout",
            Command::Quit => "quit",
        }
    }

    /// Parse one input line. Paths and passwords take the rest of the line,
    /// so they may contain spaces.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match (name, rest) {
            ("", "") | ("home", "") => Ok(Command::Home),
            ("detect", path) if !path.is_empty() => Ok(Command::Detect(PathBuf::from(path))),
            ("camera", path) if !path.is_empty() => Ok(Command::Camera(PathBuf::from(path))),
            ("history", "") => Ok(Command::History),
            ("login", args) => match args.split_once(char::is_whitespace) {
                Some((username, password)) if !password.trim_start().is_empty() => {
                    Ok(Command::Login {
                        username: username.to_string(),
                        password: password.trim_start().to_string(),
                    })
                }
                _ => Err("Usage: login <username> <password>".to_string()),
            },
            ("logout", "") => Ok(Command::Logout),
            ("quit" | "exit", "") => Ok(Command::Quit),
            _ => Err(format!("Unknown command: {}", line)),
        }
    }
}

/// Line-oriented front end driving one [`Session`]
pub struct Shell<'a> {
    pipeline: &'a DetectionPipeline,
    session: Session,
    users: Option<UserDb>,
    confidence: f32,
    output_dir: Option<PathBuf>,
}

impl<'a> Shell<'a> {
    pub fn new(pipeline: &'a DetectionPipeline, session: Session, confidence: f32) -> Self {
        Self {
            pipeline,
            session,
            users: None,
            confidence,
            output_dir: None,
        }
    }

    pub fn with_users(mut self, users: UserDb) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Detect one image and describe the result. Per-image failures are
    /// returned for display and leave the history untouched.
    pub fn detect(&mut self, input: InputImage) -> Result<String, SessionError> {
        let index = self.session.history().len() + 1;
        let record = self.session.detect(self.pipeline, input, self.confidence)?;
        let mut text = render_record(index, record);

        if let Some(dir) = &self.output_dir {
            match save_annotated(dir, index, record) {
                Ok(path) => {
                    let _ = writeln!(text, "  Hasil deteksi: {}", path.display());
                }
                Err(e) => warn!("{:#}", e),
            }
        }
        Ok(text)
    }

    /// Execute one command. Returns `false` when the session should end.
    pub async fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> anyhow::Result<bool> {
        debug!("Executing {}", command.name());
        match command {
            Command::Home => {
                writeln!(out, "{}", HOME_TEXT)?;
                if let Some(name) = self.session.display_name() {
                    writeln!(out, "\nSelamat Datang, {}!", name)?;
                }
            }
            Command::Detect(path) => {
                let result = InputImage::open(&path)
                    .map_err(|e| SessionError::from(PipelineError::from(e)))
                    .and_then(|input| self.detect(input));
                report(out, result)?;
            }
            Command::Camera(path) => {
                let result = InputImage::open_camera_frame(&path)
                    .map_err(|e| SessionError::from(PipelineError::from(e)))
                    .and_then(|input| self.detect(input));
                report(out, result)?;
            }
            Command::History => {
                write!(out, "{}", render_history(self.session.history()))?;
            }
            Command::Login { username, password } => match &self.users {
                Some(users) => match self.session.login(users, &username, &password).await {
                    Ok(()) => writeln!(out, "Berhasil login")?,
                    Err(e) => writeln!(out, "Error: {}", e)?,
                },
                None => writeln!(out, "Login is disabled")?,
            },
            Command::Logout => {
                self.session.logout();
                writeln!(out, "Logged out")?;
            }
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Read commands line by line until `quit` or end of input
    pub async fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> anyhow::Result<()> {
        self.execute(Command::Home, out).await?;
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Ok(command) => {
                    if !self.execute(command, out).await? {
                        break;
                    }
                }
                Err(message) => writeln!(out, "{}", message)?,
            }
            out.flush()?;
        }
        Ok(())
    }
}

fn report<W: Write>(out: &mut W, result: Result<String, SessionError>) -> std::io::Result<()> {
    match result {
        Ok(text) => write!(out, "{}", text),
        Err(e) => writeln!(out, "Error: {}", e),
    }
}
