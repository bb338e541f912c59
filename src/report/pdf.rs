//! Screening report as an A4 PDF via `printpdf`.
//!
//! Page one carries the risk assessment, both images, findings and
//! recommendations; the model notes and the fixed disclaimer always start a
//! fresh page. Long lists spill onto continuation pages and every page gets
//! the footer with its number.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use printpdf::*;

use super::{ReportError, ReportExporter, ReportInput};
use crate::models::{
    AnalysisResult, DiseaseStatus, LungAgeAssessment, RiskLevel, SymmetryBand,
    DEFAULT_CHRONOLOGICAL_AGE,
};
use crate::pipeline::analysis::ABNORMAL_CONFIDENCE_FLOOR;
use crate::pipeline::intake::decode_data_url;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 20.0;
const FOOTER_H: f32 = 20.0;
/// Content below this line moves to a new page.
const CONTENT_FLOOR: f32 = FOOTER_H + 10.0;
/// Longest image edge embedded, in pixels.
const MAX_EMBED_PX: u32 = 800;
const EMBED_DPI: f32 = 300.0;

const PRIMARY_BLUE: [u8; 3] = [37, 99, 235];
const DARK_TEXT: [u8; 3] = [17, 24, 39];
const GRAY_TEXT: [u8; 3] = [107, 114, 128];
const WHITE: [u8; 3] = [255, 255, 255];
const PANEL_GRAY: [u8; 3] = [248, 250, 252];
const PANEL_AMBER: [u8; 3] = [254, 243, 199];
const PANEL_RED: [u8; 3] = [254, 226, 226];

pub const DISCLAIMER_PARAGRAPHS: [&str; 5] = [
    "IMPORTANT: This AI-generated analysis is intended for investigational and research purposes only. It is NOT a medical diagnosis and should NOT be used as a substitute for professional medical advice, diagnosis, or treatment.",
    "This tool is designed to assist qualified healthcare professionals in their clinical decision-making process. The results should be interpreted in conjunction with clinical findings, patient history, and other diagnostic tests.",
    "The AI model may produce false positive or false negative results. All findings require verification by a licensed radiologist or pulmonologist before any clinical decisions are made.",
    "LungScan AI and its developers are not liable for any clinical decisions made based on this analysis. Healthcare providers remain solely responsible for patient care decisions.",
    "By using this report, you acknowledge that you understand these limitations and agree to use the information appropriately within the scope of professional medical practice.",
];

/// Renders the two-page screening report.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfReportExporter;

impl ReportExporter for PdfReportExporter {
    fn export(&self, input: &ReportInput<'_>) -> Result<Vec<u8>, ReportError> {
        generate_report_pdf(input, Utc::now())
    }

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }
}

/// Build the report. `generated_at` is printed in the header and footers.
pub fn generate_report_pdf(
    input: &ReportInput<'_>,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ReportError> {
    let result = input.result;
    let (doc, page1, layer1) = PdfDocument::new(
        "LungScan AI Screening Report",
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Pdf(format!("Font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Pdf(format!("Font error: {e}")))?;
    let generated = generated_at.format("%Y-%m-%d %H:%M UTC").to_string();

    let page_count = {
        let mut w = PageWriter {
            doc: &doc,
            layers: vec![doc.get_page(page1).get_layer(layer1)],
            y: MARGIN,
            font: &font,
            bold: &bold,
        };

        write_header(&mut w, result, &generated);
        write_risk(&mut w, result);
        write_images(&mut w, input);
        write_findings(&mut w, result);
        write_recommendations(&mut w, result);
        write_extensions(&mut w, result);

        w.new_page();
        write_model_info(&mut w, result);
        write_disclaimer(&mut w);

        w.write_footers(&generated);
        w.layers.len()
    };

    tracing::debug!(
        patient_id = %result.patient_id,
        pages = page_count,
        "Report PDF rendered"
    );

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Pdf(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReportError::Pdf(format!("PDF buffer error: {e}")))
}

/// `LungScan_Report_<patientId>_<YYYY-MM-DD>.pdf`.
pub fn report_file_name(patient_id: &str, date: NaiveDate) -> String {
    let safe: String = patient_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("LungScan_Report_{safe}_{}.pdf", date.format("%Y-%m-%d"))
}

/// Write report bytes into `dir`, creating it if needed. Returns the path.
pub fn export_to_file(
    pdf_bytes: &[u8],
    dir: &Path,
    result: &AnalysisResult,
) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(&result.patient_id, Utc::now().date_naive()));
    std::fs::write(&path, pdf_bytes)?;
    tracing::info!(path = %path.display(), size_bytes = pdf_bytes.len(), "Report exported");
    Ok(path)
}

// ── Layout cursor ─────────────────────────────────────────

/// Tracks the current page and the vertical position, measured in mm from
/// the top edge.
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layers: Vec<PdfLayerReference>,
    y: f32,
    font: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
}

impl PageWriter<'_> {
    fn layer(&self) -> &PdfLayerReference {
        // Never empty: seeded with the first page.
        &self.layers[self.layers.len() - 1]
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        self.layers.push(self.doc.get_page(page).get_layer(layer));
        self.y = MARGIN;
    }

    fn ensure(&mut self, needed: f32) {
        if PAGE_H - (self.y + needed) < CONTENT_FLOOR {
            self.new_page();
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, top: f32, bold: bool, color: [u8; 3]) {
        let layer = self.layer();
        layer.set_fill_color(rgb(color));
        let font = if bold { self.bold } else { self.font };
        layer.use_text(text, size, Mm(x), Mm(PAGE_H - top), font);
    }

    fn panel(&self, x: f32, top: f32, w: f32, h: f32, color: [u8; 3]) {
        let layer = self.layer();
        layer.set_fill_color(rgb(color));
        layer.add_rect(Rect::new(
            Mm(x),
            Mm(PAGE_H - top - h),
            Mm(x + w),
            Mm(PAGE_H - top),
        ));
    }

    fn heading(&mut self, title: &str) {
        self.ensure(16.0);
        self.text(title, 14.0, MARGIN, self.y, true, DARK_TEXT);
        self.y += 8.0;
    }

    /// Wrapped paragraph at `indent`, advancing the cursor line by line.
    fn paragraph(&mut self, text: &str, indent: f32, max_chars: usize, line_h: f32) {
        for line in wrap_text(text, max_chars) {
            self.ensure(line_h);
            self.text(&line, 10.0, MARGIN + indent, self.y, false, DARK_TEXT);
            self.y += line_h;
        }
    }

    fn write_footers(&self, generated: &str) {
        let total = self.layers.len();
        for (i, layer) in self.layers.iter().enumerate() {
            layer.set_fill_color(rgb(PRIMARY_BLUE));
            layer.add_rect(Rect::new(Mm(0.0), Mm(0.0), Mm(PAGE_W), Mm(FOOTER_H)));
            layer.set_fill_color(rgb(WHITE));
            layer.use_text(
                "LungScan AI - Confidential Medical Report",
                8.0,
                Mm(MARGIN),
                Mm(FOOTER_H - 12.0),
                self.font,
            );
            layer.use_text(
                format!("Page {} of {total} | Generated: {generated}", i + 1),
                8.0,
                Mm(PAGE_W - MARGIN - 70.0),
                Mm(FOOTER_H - 12.0),
                self.font,
            );
        }
    }
}

fn rgb(c: [u8; 3]) -> Color {
    Color::Rgb(Rgb::new(
        f32::from(c[0]) / 255.0,
        f32::from(c[1]) / 255.0,
        f32::from(c[2]) / 255.0,
        None,
    ))
}

// ── Sections ──────────────────────────────────────────────

fn write_header(w: &mut PageWriter<'_>, result: &AnalysisResult, generated: &str) {
    w.panel(0.0, 0.0, PAGE_W, 35.0, PRIMARY_BLUE);
    w.text("LungScan AI", 24.0, MARGIN, 18.0, true, WHITE);
    w.text("Screening Analysis Report", 12.0, MARGIN, 28.0, false, WHITE);

    w.y = 50.0;
    w.panel(MARGIN, w.y, PAGE_W - 2.0 * MARGIN, 25.0, PANEL_GRAY);
    let top = w.y;
    w.text("Patient ID:", 10.0, MARGIN + 5.0, top + 8.0, false, GRAY_TEXT);
    w.text("Analysis Date:", 10.0, MARGIN + 5.0, top + 18.0, false, GRAY_TEXT);
    w.text("Report Generated:", 10.0, PAGE_W / 2.0, top + 8.0, false, GRAY_TEXT);
    w.text(&result.patient_id, 10.0, MARGIN + 30.0, top + 8.0, true, DARK_TEXT);
    w.text(
        &result.analysis_timestamp.format("%Y-%m-%d").to_string(),
        10.0,
        MARGIN + 40.0,
        top + 18.0,
        true,
        DARK_TEXT,
    );
    w.text(generated, 10.0, PAGE_W / 2.0 + 35.0, top + 8.0, true, DARK_TEXT);
    w.y += 35.0;
}

fn risk_color(level: RiskLevel) -> [u8; 3] {
    match level {
        RiskLevel::Low => [16, 185, 129],
        RiskLevel::Medium => [234, 179, 8],
        RiskLevel::High => [220, 38, 38],
    }
}

pub fn risk_description(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "High probability of malignancy - Immediate follow-up required",
        RiskLevel::Medium => "Moderate risk - Follow-up imaging recommended",
        RiskLevel::Low => "Low probability - Continue routine screening",
    }
}

fn write_risk(w: &mut PageWriter<'_>, result: &AnalysisResult) {
    w.heading("RISK ASSESSMENT");
    let top = w.y;
    w.panel(MARGIN, top, 50.0, 25.0, risk_color(result.risk_level));
    w.text(&format!("{}%", result.risk_score), 20.0, MARGIN + 10.0, top + 16.0, true, WHITE);
    w.text(
        &format!("Risk Level: {}", result.risk_level),
        12.0,
        MARGIN + 60.0,
        top + 8.0,
        true,
        DARK_TEXT,
    );
    w.text(risk_description(result.risk_level), 10.0, MARGIN + 60.0, top + 15.0, false, DARK_TEXT);
    w.text(
        &format!(
            "Classification: {} | Confidence: {}%",
            result.classification, result.confidence
        ),
        10.0,
        MARGIN + 60.0,
        top + 22.0,
        false,
        DARK_TEXT,
    );
    w.y += 35.0;
}

fn write_images(w: &mut PageWriter<'_>, input: &ReportInput<'_>) {
    let img_w = (PAGE_W - 2.0 * MARGIN - 10.0) / 2.0;
    let img_h = 50.0;

    w.heading("IMAGING ANALYSIS");
    w.ensure(img_h + 20.0);
    let top = w.y;
    let right = MARGIN + img_w + 10.0;

    w.text("Original X-ray", 10.0, MARGIN, top + 5.0, false, DARK_TEXT);
    embed_image(w, input.original_image, MARGIN, top + 8.0, img_w, img_h);

    w.text("Heatmap Overlay", 10.0, right, top + 5.0, false, DARK_TEXT);
    match input.heatmap_image {
        Some(heatmap) => embed_image(w, heatmap, right, top + 8.0, img_w, img_h),
        None => w.text("(no heatmap available)", 9.0, right, top + 30.0, false, GRAY_TEXT),
    }

    w.y += img_h + 20.0;
}

/// Scale the image to fit the box, centred horizontally. A payload that
/// cannot be decoded leaves a note instead of failing the export.
fn embed_image(w: &PageWriter<'_>, data_url: &str, x: f32, top: f32, box_w: f32, box_h: f32) {
    let decoded = decode_data_url(data_url)
        .map_err(|e| e.to_string())
        .and_then(|d| ::image::load_from_memory(&d.bytes).map_err(|e| e.to_string()));
    let img = match decoded {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, "Report image could not be embedded");
            w.text("(image unavailable)", 9.0, x, top + box_h / 2.0, false, GRAY_TEXT);
            return;
        }
    };

    let rgb_img = img.thumbnail(MAX_EMBED_PX, MAX_EMBED_PX).to_rgb8();
    let (px_w, px_h) = rgb_img.dimensions();
    let natural_w = px_w as f32 * 25.4 / EMBED_DPI;
    let natural_h = px_h as f32 * 25.4 / EMBED_DPI;
    let scale = (box_w / natural_w).min(box_h / natural_h);
    let drawn_w = natural_w * scale;
    let drawn_h = natural_h * scale;

    let pdf_image = Image::from_dynamic_image(&::image::DynamicImage::ImageRgb8(rgb_img));
    pdf_image.add_to_layer(
        w.layer().clone(),
        ImageTransform {
            translate_x: Some(Mm(x + (box_w - drawn_w) / 2.0)),
            translate_y: Some(Mm(PAGE_H - top - drawn_h)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(EMBED_DPI),
            ..Default::default()
        },
    );
}

fn write_findings(w: &mut PageWriter<'_>, result: &AnalysisResult) {
    w.heading("DETAILED FINDINGS");

    w.ensure(25.0);
    let top = w.y;
    w.panel(MARGIN, top, PAGE_W - 2.0 * MARGIN, 20.0, PANEL_AMBER);
    w.text("Primary Finding:", 10.0, MARGIN + 3.0, top + 6.0, true, DARK_TEXT);
    w.text(&result.nodule_location, 10.0, MARGIN + 35.0, top + 6.0, false, DARK_TEXT);
    w.text(&result.nodule_dimensions, 10.0, MARGIN + 3.0, top + 14.0, false, DARK_TEXT);
    w.y += 25.0;

    if result.findings.is_empty() {
        w.paragraph("- No significant abnormalities detected", 3.0, 95, 6.0);
    }
    for finding in &result.findings {
        w.paragraph(&format!("- {finding}"), 3.0, 95, 6.0);
    }
    w.y += 5.0;

    if !result.additional_observations.is_empty() {
        w.ensure(12.0);
        w.text("Additional Observations:", 10.0, MARGIN, w.y, true, DARK_TEXT);
        w.y += 6.0;
        for obs in &result.additional_observations {
            w.paragraph(&format!("- {obs}"), 3.0, 95, 5.0);
        }
    }
    w.y += 10.0;
}

fn write_recommendations(w: &mut PageWriter<'_>, result: &AnalysisResult) {
    w.heading("RECOMMENDATIONS");
    for (i, rec) in result.recommendations.iter().enumerate() {
        w.paragraph(&format!("{}. {rec}", i + 1), 3.0, 90, 5.0);
        w.y += 2.0;
    }
}

/// One line per optional panel the analysis returned.
pub(crate) fn extension_lines(result: &AnalysisResult) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(lung_age) = &result.lung_age {
        let assessment = match lung_age.assess(DEFAULT_CHRONOLOGICAL_AGE) {
            LungAgeAssessment::Younger => "younger than typical",
            LungAgeAssessment::Typical => "typical for age",
            LungAgeAssessment::Older => "older than typical",
        };
        lines.push(format!("Estimated lung age: {} years ({assessment})", lung_age.age));
        if !lung_age.notes.is_empty() {
            lines.push(format!("  {}", lung_age.notes));
        }
    }

    if let Some(sym) = &result.symmetry_analysis {
        let band = match sym.band() {
            SymmetryBand::Symmetric => "symmetric",
            SymmetryBand::Mild => "mild asymmetry",
            SymmetryBand::Concerning => "concerning asymmetry",
        };
        lines.push(format!("Lung symmetry: {}/100 ({band})", sym.score));
        if !sym.asymmetric_regions.is_empty() {
            lines.push(format!("  Asymmetric regions: {}", sym.asymmetric_regions.join(", ")));
        }
    }

    if let Some(diseases) = &result.multi_disease_results {
        for d in diseases {
            let status = match d.status() {
                DiseaseStatus::Clear => "clear",
                DiseaseStatus::Detected => "detected",
                DiseaseStatus::Uncertain => "uncertain",
            };
            lines.push(format!("{}: {status} ({}% confidence)", d.disease, d.confidence));
        }
    }

    if let Some(cmp) = &result.comparison_results {
        lines.push(format!(
            "Comparison with previous scan: {} (progression rate {:.1}%)",
            if cmp.overall_trend.is_empty() { "no trend reported" } else { cmp.overall_trend.as_str() },
            cmp.progression_rate
        ));
        for change in &cmp.changes {
            lines.push(format!("  - {change}"));
        }
    }

    lines
}

fn write_extensions(w: &mut PageWriter<'_>, result: &AnalysisResult) {
    let lines = extension_lines(result);
    if lines.is_empty() {
        return;
    }
    w.y += 6.0;
    w.heading("ADVANCED ANALYSIS");
    for line in lines {
        w.paragraph(&line, 3.0, 95, 5.0);
    }
}

fn write_model_info(w: &mut PageWriter<'_>, result: &AnalysisResult) {
    w.heading("AI MODEL INFORMATION");
    w.y += 2.0;
    let top = w.y;
    w.panel(MARGIN, top, PAGE_W - 2.0 * MARGIN, 35.0, PANEL_GRAY);
    let lines = [
        "Inference: remote vision-language model with a chest X-ray validation stage".to_string(),
        format!(
            "Confidence threshold: abnormal calls below {ABNORMAL_CONFIDENCE_FLOOR}% are reported as Inconclusive"
        ),
        format!("Classification: {}", result.classification),
        format!("Analysis Confidence: {}%", result.confidence),
    ];
    for (i, line) in lines.iter().enumerate() {
        w.text(line, 10.0, MARGIN + 5.0, top + 8.0 * (i as f32 + 1.0), false, DARK_TEXT);
    }
    w.y += 50.0;
}

fn write_disclaimer(w: &mut PageWriter<'_>) {
    w.heading("MEDICAL DISCLAIMER");

    let wrapped: Vec<Vec<String>> = DISCLAIMER_PARAGRAPHS
        .iter()
        .map(|p| wrap_text(p, 100))
        .collect();
    let line_count: usize = wrapped.iter().map(Vec::len).sum();
    let box_h = line_count as f32 * 4.0 + wrapped.len() as f32 * 3.0 + 6.0;

    w.ensure(box_h);
    w.panel(MARGIN, w.y, PAGE_W - 2.0 * MARGIN, box_h, PANEL_RED);
    w.y += 8.0;
    for paragraph in wrapped {
        for line in paragraph {
            w.text(&line, 9.0, MARGIN + 5.0, w.y, false, DARK_TEXT);
            w.y += 4.0;
        }
        w.y += 3.0;
    }
}

/// Word-wrap for fixed-size PDF text.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
