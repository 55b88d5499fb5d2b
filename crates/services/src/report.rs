//! PDF export of completion records.

use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use printpdf::lopdf::Document;
use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use storage::repository::{SiteRepository, StorageError, UserRepository};
use tracing::info;

use crate::Clock;
use crate::error::ReportError;
use crate::record_service::{RecordScope, RecordService, RecordWithGuard};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const ROW_HEIGHT: f32 = 7.0;
const COLUMNS: [(&str, f32); 6] = [
    ("경비원", 15.0),
    ("현장", 45.0),
    ("교육자료", 85.0),
    ("유형", 140.0),
    ("날짜", 158.0),
    ("시간", 183.0),
];
/// Report times are printed in Korea Standard Time.
const DISPLAY_OFFSET_SECS: i32 = 9 * 3600;
const UNKNOWN: &str = "-";

/// Hangul syllables and compatibility jamo (NanumBarunGothic, SIL OFL 1.1;
/// see `assets/fonts/NanumBarunGothic-OFL.txt`).
const BUNDLED_HANGUL: &[u8] = include_bytes!("../assets/fonts/NanumBarunGothic.ttf");

/// Font used when rendering.
#[derive(Debug, Clone, Default)]
pub enum ReportFont {
    /// Hangul from the bundled face, everything else in Helvetica.
    #[default]
    Bundled,
    /// One TrueType face that draws every character.
    External(Vec<u8>),
}

impl ReportFont {
    /// # Errors
    ///
    /// Returns `ReportError::Font` if the file cannot be read.
    pub fn from_path(path: &std::path::Path) -> Result<Self, ReportError> {
        std::fs::read(path)
            .map(ReportFont::External)
            .map_err(|e| ReportError::Font(format!("{}: {e}", path.display())))
    }

    fn load(&self, doc: &PdfDocumentReference) -> Result<Faces, ReportError> {
        let font_err = |e: printpdf::Error| ReportError::Font(e.to_string());
        match self {
            ReportFont::Bundled => Ok(Faces::Mixed {
                hangul: doc
                    .add_external_font(Cursor::new(BUNDLED_HANGUL))
                    .map_err(font_err)?,
                latin: doc
                    .add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(font_err)?,
            }),
            ReportFont::External(bytes) => doc
                .add_external_font(Cursor::new(bytes.as_slice()))
                .map(Faces::Single)
                .map_err(font_err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Hangul,
    Latin,
}

fn is_hangul(ch: char) -> bool {
    matches!(ch, '\u{AC00}'..='\u{D7A3}' | '\u{3131}'..='\u{318E}')
}

fn script_of(ch: char) -> Result<Script, ReportError> {
    if is_hangul(ch) {
        return Ok(Script::Hangul);
    }
    let mut buf = [0; 4];
    // Helvetica is written in WinAnsiEncoding, which drops what it cannot map.
    if Document::encode_text(Some("WinAnsiEncoding"), ch.encode_utf8(&mut buf)).len() == 1 {
        Ok(Script::Latin)
    } else {
        Err(ReportError::Font(format!(
            "{ch:?} (U+{:04X}) is not covered by the bundled fonts; set report_font",
            u32::from(ch)
        )))
    }
}

/// Splits `text` into maximal runs drawn with the same face.
fn script_runs(text: &str) -> Result<Vec<(Script, &str)>, ReportError> {
    let mut runs = Vec::new();
    let mut current: Option<(Script, usize)> = None;
    for (i, ch) in text.char_indices() {
        let script = script_of(ch)?;
        match current {
            Some((s, _)) if s == script => {}
            Some((s, start)) => {
                runs.push((s, &text[start..i]));
                current = Some((script, i));
            }
            None => current = Some((script, i)),
        }
    }
    if let Some((s, start)) = current {
        runs.push((s, &text[start..]));
    }
    Ok(runs)
}

enum Faces {
    Mixed {
        hangul: IndirectFontRef,
        latin: IndirectFontRef,
    },
    Single(IndirectFontRef),
}

impl Faces {
    /// Draws one line at `(x, y)`. Mixed runs share a text object so each run
    /// starts where the previous one ended.
    fn draw(
        &self,
        layer: &PdfLayerReference,
        text: &str,
        size: f32,
        x: f32,
        y: f32,
    ) -> Result<(), ReportError> {
        match self {
            Faces::Single(font) => layer.use_text(text, size, Mm(x), Mm(y), font),
            Faces::Mixed { hangul, latin } => {
                let runs = script_runs(text)?;
                layer.begin_text_section();
                layer.set_text_cursor(Mm(x), Mm(y));
                for (script, run) in runs {
                    let font = match script {
                        Script::Hangul => hangul,
                        Script::Latin => latin,
                    };
                    layer.set_font(font, size);
                    layer.write_text(run, font);
                }
                layer.end_text_section();
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub guard: String,
    pub site: String,
    pub material: String,
    pub kind: &'static str,
    pub date: String,
    pub time: String,
}

/// Everything printed on an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub title: String,
    pub printed_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
}

fn display_offset() -> FixedOffset {
    FixedOffset::east_opt(DISPLAY_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

impl RecordReport {
    #[must_use]
    pub fn from_records(
        title: impl Into<String>,
        printed_at: DateTime<Utc>,
        records: &[RecordWithGuard],
    ) -> Self {
        let offset = display_offset();
        let rows = records
            .iter()
            .map(|r| {
                let local = r.record.completed_at.with_timezone(&offset);
                ReportRow {
                    guard: r
                        .guard
                        .as_ref()
                        .map_or_else(|| UNKNOWN.to_owned(), |g| g.guard.name.clone()),
                    site: r
                        .guard
                        .as_ref()
                        .and_then(|g| g.site.as_ref())
                        .map_or_else(|| UNKNOWN.to_owned(), |s| s.name.clone()),
                    material: r.record.material_title.clone(),
                    kind: r.record.material_kind.label(),
                    date: local.format("%Y-%m-%d").to_string(),
                    time: local.format("%H:%M").to_string(),
                }
            })
            .collect();
        Self {
            title: title.into(),
            printed_at,
            rows,
        }
    }

    /// Renders the report as an A4 PDF, continuing onto new pages as needed.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Font` or `ReportError::Pdf` when printpdf fails.
    pub fn to_pdf(&self, font: &ReportFont) -> Result<Vec<u8>, ReportError> {
        let (doc, page, layer) =
            PdfDocument::new(&self.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "records");
        let faces = font.load(&doc)?;
        let mut layer = doc.get_page(page).get_layer(layer);

        let printed = self.printed_at.with_timezone(&display_offset());
        faces.draw(&layer, &self.title, 16.0, MARGIN, PAGE_HEIGHT - 20.0)?;
        faces.draw(
            &layer,
            &format!("출력일: {}", printed.format("%Y-%m-%d %H:%M")),
            9.0,
            MARGIN,
            PAGE_HEIGHT - 27.0,
        )?;
        faces.draw(
            &layer,
            &format!("총 {}건", self.rows.len()),
            9.0,
            MARGIN,
            PAGE_HEIGHT - 32.0,
        )?;

        let header = |layer: &PdfLayerReference, y: f32| -> Result<(), ReportError> {
            for (label, x) in COLUMNS {
                faces.draw(layer, label, 10.0, x, y)?;
            }
            Ok(())
        };
        let mut y = PAGE_HEIGHT - 42.0;
        header(&layer, y)?;
        y -= ROW_HEIGHT;

        for row in &self.rows {
            if y < MARGIN {
                let (page, next) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "records");
                layer = doc.get_page(page).get_layer(next);
                y = PAGE_HEIGHT - 20.0;
                header(&layer, y)?;
                y -= ROW_HEIGHT;
            }
            let cells = [
                row.guard.as_str(),
                row.site.as_str(),
                row.material.as_str(),
                row.kind,
                row.date.as_str(),
                row.time.as_str(),
            ];
            for (text, (_, x)) in cells.into_iter().zip(COLUMNS) {
                faces.draw(&layer, text, 9.0, x, y)?;
            }
            y -= ROW_HEIGHT;
        }

        doc.save_to_bytes().map_err(|e| ReportError::Pdf(e.to_string()))
    }
}

/// Builds record exports for admins.
#[derive(Clone)]
pub struct ReportService {
    clock: Clock,
    records: Arc<RecordService>,
    users: Arc<dyn UserRepository>,
    sites: Arc<dyn SiteRepository>,
    font: ReportFont,
}

impl ReportService {
    #[must_use]
    pub fn new(
        clock: Clock,
        records: Arc<RecordService>,
        users: Arc<dyn UserRepository>,
        sites: Arc<dyn SiteRepository>,
        font: ReportFont,
    ) -> Self {
        Self {
            clock,
            records,
            users,
            sites,
            font,
        }
    }

    /// # Errors
    ///
    /// Returns `ReportError::Storage(NotFound)` for an unknown guard or site.
    pub async fn build(&self, scope: RecordScope) -> Result<RecordReport, ReportError> {
        let title = match scope {
            RecordScope::All => "전체 교육 이수 기록".to_owned(),
            RecordScope::Guard(id) => {
                let guard = self.users.get_user(id).await?.ok_or(StorageError::NotFound)?;
                format!("{} 교육 이수 기록", guard.name)
            }
            RecordScope::Site(id) => {
                let site = self.sites.get_site(id).await?.ok_or(StorageError::NotFound)?;
                format!("{} 현장 교육 이수 기록", site.name)
            }
        };
        let records = self.records.list(scope).await?;
        Ok(RecordReport::from_records(title, self.clock.now(), &records))
    }

    /// # Errors
    ///
    /// See [`ReportService::build`] and [`RecordReport::to_pdf`].
    pub async fn render(&self, scope: RecordScope) -> Result<Vec<u8>, ReportError> {
        let report = self.build(scope).await?;
        let bytes = report.to_pdf(&self.font)?;
        info!(rows = report.rows.len(), bytes = bytes.len(), "record report rendered");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use printpdf::lopdf::content::Content;
    use storage::repository::{
        CompletionRepository, InMemoryRepository, MaterialRepository, SiteRepository,
        UserRepository,
    };
    use training_core::model::{
        Company, CompletionRecord, MaterialDraft, MaterialId, MaterialKind, RecordId, Role,
        SiteDraft, SiteId, User, UserDraft, UserId,
    };
    use training_core::time::fixed_now;

    use crate::guard_service::GuardWithSite;

    fn guard(name: &str) -> User {
        UserDraft {
            name: name.into(),
            ..UserDraft::default()
        }
        .validate(UserId::generate(), Role::Guard, fixed_now())
        .unwrap()
    }

    fn record(guard_id: UserId, at: DateTime<Utc>) -> CompletionRecord {
        CompletionRecord {
            id: RecordId::generate(),
            guard_id,
            material_id: MaterialId::generate(),
            material_kind: MaterialKind::Video,
            material_title: "화재 대응".into(),
            completed_at: at,
            score: Some(100),
            passed: Some(true),
        }
    }

    #[test]
    fn rows_are_printed_in_korean_time() {
        let g = guard("한경비");
        let at = Utc.with_ymd_and_hms(2024, 3, 31, 16, 5, 0).unwrap();
        let report = RecordReport::from_records(
            "기록",
            fixed_now(),
            &[RecordWithGuard {
                record: record(g.id, at),
                guard: Some(GuardWithSite {
                    guard: g,
                    site: None,
                }),
            }],
        );
        assert_eq!(
            report.rows,
            vec![ReportRow {
                guard: "한경비".into(),
                site: "-".into(),
                material: "화재 대응".into(),
                kind: "동영상",
                date: "2024-04-01".into(),
                time: "01:05".into(),
            }]
        );
    }

    #[test]
    fn missing_guard_prints_placeholder() {
        let report = RecordReport::from_records(
            "기록",
            fixed_now(),
            &[RecordWithGuard {
                record: record(UserId::generate(), fixed_now()),
                guard: None,
            }],
        );
        assert_eq!(report.rows[0].guard, "-");
    }

    #[test]
    fn long_reports_span_pages() {
        let g = guard("Kim");
        let records: Vec<_> = (0..80)
            .map(|_| RecordWithGuard {
                record: record(g.id, fixed_now()),
                guard: None,
            })
            .collect();
        let bytes = RecordReport::from_records("Records", fixed_now(), &records)
            .to_pdf(&ReportFont::default())
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    fn site(name: &str) -> training_core::model::Site {
        SiteDraft {
            name: name.into(),
            company: Company::DawonPmc,
            address: None,
        }
        .validate(SiteId::generate(), fixed_now())
        .unwrap()
    }

    /// Total bytes handed to `Tj` across every page.
    fn shown_text_bytes(pdf: &[u8]) -> usize {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .values()
            .map(|&page| {
                let content = Content::decode(&doc.get_page_content(page).unwrap()).unwrap();
                content
                    .operations
                    .iter()
                    .filter(|op| op.operator == "Tj")
                    .map(|op| op.operands[0].as_str().unwrap().len())
                    .sum::<usize>()
            })
            .sum()
    }

    #[test]
    fn hangul_is_drawn_with_the_default_font() {
        let g = guard("한경비");
        let report = RecordReport::from_records(
            "판교 현장 교육 이수 기록",
            fixed_now(),
            &[RecordWithGuard {
                record: record(g.id, fixed_now()),
                guard: Some(GuardWithSite {
                    guard: g,
                    site: Some(site("판교")),
                }),
            }],
        );
        let pdf = report.to_pdf(&ReportFont::default()).unwrap();

        let drawn = [
            "판교 현장 교육 이수 기록",
            "출력일: 2024-03-01 18:00",
            "총 1건",
            "경비원",
            "현장",
            "교육자료",
            "유형",
            "날짜",
            "시간",
            "한경비",
            "판교",
            "화재 대응",
            "동영상",
            "2024-03-01",
            "18:00",
        ];
        // Two-byte glyph ids for Hangul, one WinAnsi byte for everything else.
        let expected: usize = drawn
            .iter()
            .flat_map(|s| s.chars())
            .map(|c| if is_hangul(c) { 2 } else { 1 })
            .sum();
        assert_eq!(shown_text_bytes(&pdf), expected);
    }

    #[test]
    fn runs_switch_face_at_script_boundaries() {
        let runs = script_runs("총 12건").unwrap();
        assert_eq!(
            runs,
            vec![
                (Script::Hangul, "총"),
                (Script::Latin, " 12"),
                (Script::Hangul, "건"),
            ]
        );
        assert!(script_runs("").unwrap().is_empty());
    }

    #[test]
    fn characters_outside_the_bundled_fonts_are_rejected() {
        let g = guard("王경비");
        let report = RecordReport::from_records(
            "기록",
            fixed_now(),
            &[RecordWithGuard {
                record: record(g.id, fixed_now()),
                guard: Some(GuardWithSite {
                    guard: g,
                    site: None,
                }),
            }],
        );
        let err = report.to_pdf(&ReportFont::default()).unwrap_err();
        assert!(matches!(err, ReportError::Font(msg) if msg.contains("U+738B")));
    }

    #[test]
    fn unreadable_font_is_reported() {
        let err = ReportFont::from_path(std::path::Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, ReportError::Font(_)));
    }

    #[tokio::test]
    async fn site_report_is_titled_and_scoped() {
        let repo = InMemoryRepository::new();
        let clock = Clock::Fixed(fixed_now());
        let site = site("판교");
        repo.insert_site(&site).await.unwrap();
        let mut here = guard("여기");
        here.site_id = Some(site.id);
        let elsewhere = guard("저기");
        repo.insert_user(&here).await.unwrap();
        repo.insert_user(&elsewhere).await.unwrap();
        let material = MaterialDraft {
            title: "순찰".into(),
            card_images: vec!["/objects/a.png".into()],
            ..MaterialDraft::default()
        }
        .validate(fixed_now())
        .unwrap()
        .assign_id(MaterialId::generate());
        repo.insert_material(&material).await.unwrap();
        for g in [&here, &elsewhere] {
            let mut r = record(g.id, fixed_now());
            r.material_id = material.id;
            repo.insert_record(&r).await.unwrap();
        }

        let records = Arc::new(RecordService::new(
            clock,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        ));
        let svc = ReportService::new(
            clock,
            records,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            ReportFont::default(),
        );

        let report = svc.build(RecordScope::Site(site.id)).await.unwrap();
        assert_eq!(report.title, "판교 현장 교육 이수 기록");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].guard, "여기");
        assert_eq!(report.rows[0].site, "판교");

        let err = svc.build(RecordScope::Guard(UserId::generate())).await.unwrap_err();
        assert!(matches!(err, ReportError::Storage(StorageError::NotFound)));
    }
}
