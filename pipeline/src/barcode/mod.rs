//! Barcode side path.
//!
//! After a run is loaded, every membrane and image name stored in the
//! warehouse gets a Code 128 (code set B) barcode, written as SVG:
//!
//! ```text
//! <out>/membrane_barcodes/barcode_<membrane_name>.svg
//! <out>/images_barcodes/barcode_<image_name>.svg
//! ```

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BarcodeError, BarcodeResult, PipelineResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::transform::schema::fields::{IMAGE_NAME, MEMBRANE_NAME};
use crate::transform::schema::{IMAGES_DIMENSION, MEMBRANE_DIMENSION};
use crate::warehouse::Warehouse;

/// Bar/space widths of Code 128 symbols 0–105.
#[rustfmt::skip]
const PATTERNS: [&str; 106] = [
    "212222", "222122", "222221", "121223", "121322", "131222", "122213", "122312",
    "132212", "221213", "221312", "231212", "112232", "122132", "122231", "113222",
    "123122", "123221", "223211", "221132", "221231", "213212", "223112", "312131",
    "311222", "321122", "321221", "312212", "322112", "322211", "212123", "212321",
    "232121", "111323", "131123", "131321", "112313", "132113", "132311", "211313",
    "231113", "231311", "112133", "112331", "132131", "113123", "113321", "133121",
    "313121", "211331", "231131", "213113", "213311", "213131", "311123", "311321",
    "331121", "312113", "312311", "332111", "314111", "221411", "431111", "111224",
    "111422", "121124", "121421", "141122", "141221", "112214", "112412", "122114",
    "122411", "142112", "142211", "241211", "221114", "413111", "241112", "134111",
    "111242", "121142", "121241", "114212", "124112", "124211", "411212", "421112",
    "421211", "212141", "214121", "412121", "111143", "111341", "131141", "114113",
    "114311", "411113", "411311", "113141", "114131", "311141", "411131", "211412",
    "211214", "211232",
];

const START_B: usize = 104;
const STOP: &str = "2331112";

/// Width of the quiet zone on each side, in modules.
const QUIET_ZONE: u32 = 10;
const MODULE_PX: u32 = 2;
const BAR_HEIGHT_PX: u32 = 80;
const LABEL_HEIGHT_PX: u32 = 20;

/// Symbol values of `data`: start, payload, checksum (no stop).
pub fn encode(data: &str) -> BarcodeResult<Vec<usize>> {
    if data.is_empty() {
        return Err(BarcodeError::Empty);
    }
    let mut symbols = vec![START_B];
    for character in data.chars() {
        if !(' '..='~').contains(&character) {
            return Err(BarcodeError::UnsupportedCharacter {
                value: data.to_string(),
                character,
            });
        }
        symbols.push(character as usize - 32);
    }
    symbols.push(checksum(&symbols));
    Ok(symbols)
}

/// Modulo-103 checksum over start symbol and payload.
pub fn checksum(symbols: &[usize]) -> usize {
    symbols
        .iter()
        .enumerate()
        .map(|(position, value)| value * position.max(1))
        .sum::<usize>()
        % 103
}

/// Module widths of the full symbol, alternating bar and space.
fn module_widths(symbols: &[usize]) -> Vec<u32> {
    symbols
        .iter()
        .map(|s| PATTERNS[*s])
        .chain(std::iter::once(STOP))
        .flat_map(|p| p.bytes().map(|b| u32::from(b - b'0')))
        .collect()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render `data` as a standalone SVG document.
pub fn render_svg(data: &str) -> BarcodeResult<String> {
    let widths = module_widths(&encode(data)?);
    let total_modules: u32 = widths.iter().sum::<u32>() + 2 * QUIET_ZONE;
    let width = total_modules * MODULE_PX;
    let height = BAR_HEIGHT_PX + LABEL_HEIGHT_PX;

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n\
         <rect width=\"{w}\" height=\"{h}\" fill=\"white\"/>\n",
        w = width,
        h = height
    );
    let mut x = QUIET_ZONE * MODULE_PX;
    for (i, modules) in widths.iter().enumerate() {
        let bar_width = modules * MODULE_PX;
        if i % 2 == 0 {
            svg.push_str(&format!(
                "<rect x=\"{}\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"black\"/>\n",
                x, bar_width, BAR_HEIGHT_PX
            ));
        }
        x += bar_width;
    }
    svg.push_str(&format!(
        "<text x=\"{}\" y=\"{}\" font-family=\"monospace\" font-size=\"14\" text-anchor=\"middle\">{}</text>\n</svg>\n",
        width / 2,
        BAR_HEIGHT_PX + LABEL_HEIGHT_PX - 4,
        escape_xml(data)
    ));
    Ok(svg)
}

/// File name for one barcode; path separators are replaced.
fn file_name(code: &str) -> String {
    let safe: String = code
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("barcode_{}.svg", safe)
}

/// Write one SVG per code into `folder`. Returns the written paths.
pub fn generate_and_save(codes: &[String], folder: &Path) -> BarcodeResult<Vec<PathBuf>> {
    fs::create_dir_all(folder)?;
    let mut written = Vec::with_capacity(codes.len());
    for code in codes {
        let path = folder.join(file_name(code));
        fs::write(&path, render_svg(code)?)?;
        written.push(path);
    }
    Ok(written)
}

/// Summary of one barcode run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarcodeReport {
    pub membranes: usize,
    pub images: usize,
}

fn codes(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Fetch membrane and image names from the warehouse and render their barcodes.
pub async fn populate_barcodes<W>(warehouse: &mut W, out_dir: &Path) -> PipelineResult<BarcodeReport>
where
    W: Warehouse + ?Sized,
{
    log_info("🏷️  Generating barcodes...");
    let membranes = codes(warehouse.fetch_column(MEMBRANE_DIMENSION, MEMBRANE_NAME).await?);
    let images = codes(warehouse.fetch_column(IMAGES_DIMENSION, IMAGE_NAME).await?);

    if membranes.is_empty() && images.is_empty() {
        log_warning("No membrane or image names found in the warehouse");
    }

    let membrane_dir = out_dir.join("membrane_barcodes");
    let images_dir = out_dir.join("images_barcodes");
    generate_and_save(&membranes, &membrane_dir)?;
    generate_and_save(&images, &images_dir)?;

    log_success(format!(
        "{} membrane barcodes in {}",
        membranes.len(),
        membrane_dir.display()
    ));
    log_success(format!(
        "{} image barcodes in {}",
        images.len(),
        images_dir.display()
    ));

    Ok(BarcodeReport {
        membranes: membranes.len(),
        images: images.len(),
    })
}
