// ==========================================
// 物料盘点导入系统 - 工作簿内存模型与加载
// ==========================================
// 职责: 将 Excel/ODS/CSV 文件载入为按坐标寻址的内存工作簿
// 工具: calamine (Excel/ODS), csv (单表 CSV)
// 约定: 行号、列号均从 1 开始（与表格界面一致）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

// ==========================================
// CellAddress - 单元格坐标
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub sheet: Option<String>, // 跨表引用时的表名
    pub row: u32,
    pub col: u32,
}

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:'?([^'!]+)'?!)?\$?([A-Za-z]{1,3})\$?([1-9]\d*)$").expect("坐标正则合法")
    })
}

impl CellAddress {
    pub fn new(row: u32, col: u32) -> Self {
        Self { sheet: None, row, col }
    }

    /// 解析 "D9"、"$AD$15"、"Feuil1!K8"、"'Mon Onglet'!A1"
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = address_regex().captures(raw.trim())?;
        let col = column_index(caps.get(2)?.as_str())?;
        let row = caps.get(3)?.as_str().parse::<u32>().ok()?;
        Some(Self {
            sheet: caps.get(1).map(|m| m.as_str().to_string()),
            row,
            col,
        })
    }

    /// 展示用坐标（如 "AD15"）
    pub fn label(&self) -> String {
        format!("{}{}", column_letters(self.col), self.row)
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}!{}", sheet, self.label()),
            None => write!(f, "{}", self.label()),
        }
    }
}

/// 列字母 → 列号（"A" → 1, "AD" → 30）
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_uppercase() {
            Some(acc * 26 + (c as u32 - 'A' as u32 + 1))
        } else {
            None
        }
    })
}

/// 列号 → 列字母
pub fn column_letters(mut col: u32) -> String {
    let mut out = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    out.iter().rev().collect()
}

// ==========================================
// CellValue - 原始单元格值
// ==========================================
// calamine 只产出 Empty/Number/Bool/Text/Date/Error/Formula;
// Hyperlink/RichText 由内存构建的工作簿（JSON/测试）提供
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDateTime),
    Formula {
        formula: String,                 // 不含前导 '='
        result: Option<Box<CellValue>>, // 缓存的计算结果
    },
    Hyperlink {
        text: String,
        rich_text: Vec<String>,
        target: String,
    },
    RichText(Vec<String>),
    Error(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn formula(formula: impl Into<String>, result: Option<CellValue>) -> Self {
        CellValue::Formula {
            formula: formula.into().trim_start_matches('=').to_string(),
            result: result.map(Box::new),
        }
    }
}

// ==========================================
// Sheet - 工作表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u32), CellValue>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// 按坐标写入单元格（坐标无效时忽略）
    pub fn set(&mut self, address: &str, value: CellValue) -> &mut Self {
        if let Some(addr) = CellAddress::parse(address) {
            self.set_at(addr.row, addr.col, value);
        }
        self
    }

    pub fn set_at(&mut self, row: u32, col: u32, value: CellValue) {
        if value == CellValue::Empty {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    /// 读取单元格,缺失视为 Empty
    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells.get(&(row, col)).unwrap_or(&EMPTY)
    }

    /// 最后一个非空行号（空表为 0）
    pub fn last_row(&self) -> u32 {
        self.cells.keys().map(|(r, _)| *r).max().unwrap_or(0)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

// ==========================================
// Workbook - 工作簿
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    /// 从文件加载（按扩展名选择解析器）
    ///
    /// # 支持
    /// - .xlsx/.xlsm/.xlsb/.xls/.ods: calamine,含公式文本
    /// - .csv: 单表,表名取文件名
    pub fn open<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let workbook = match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_spreadsheet(path)?,
            "csv" => load_csv(path)?,
            _ => return Err(ImportError::UnsupportedFormat(ext)),
        };

        info!(
            path = %path.display(),
            sheets = ?workbook.sheet_names(),
            "工作簿加载完成"
        );
        Ok(workbook)
    }

    /// 合并多个文件（CSV 导出的概览页与物料页分别为一个文件时使用）
    pub fn open_many<P: AsRef<Path>>(paths: &[P]) -> ImportResult<Self> {
        let mut merged = Workbook::default();
        for path in paths {
            for sheet in Workbook::open(path)?.sheets {
                merged.add_sheet(sheet);
            }
        }
        Ok(merged)
    }
}

fn load_spreadsheet(path: &Path) -> ImportResult<Workbook> {
    let mut reader = open_workbook_auto(path)?;
    let mut workbook = Workbook::default();

    for name in reader.sheet_names() {
        let mut sheet = Sheet::new(name.clone());

        let range = reader.worksheet_range(&name)?;
        if let Some((row0, col0)) = range.start() {
            for (r, c, data) in range.cells() {
                let value = data_to_cell(data);
                sheet.set_at(row0 + r as u32 + 1, col0 + c as u32 + 1, value);
            }
        }

        // 公式文本单独存放,与缓存值合并
        if let Ok(formulas) = reader.worksheet_formula(&name) {
            if let Some((row0, col0)) = formulas.start() {
                for (r, c, formula) in formulas.cells() {
                    if formula.is_empty() {
                        continue;
                    }
                    let (row, col) = (row0 + r as u32 + 1, col0 + c as u32 + 1);
                    let cached = match sheet.get(row, col) {
                        CellValue::Empty => None,
                        other => Some(other.clone()),
                    };
                    sheet.set_at(row, col, CellValue::formula(formula.as_str(), cached));
                }
            }
        }

        debug!(sheet = %name, cells = sheet.cell_count(), "工作表读取完成");
        workbook.add_sheet(sheet);
    }

    Ok(workbook)
}

fn data_to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(value) => CellValue::Date(value),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

/// Excel 序列日期 → 日期时间（1900 纪元,基准 1899-12-30）
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(Duration::milliseconds(millis))
}

fn parse_iso_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn load_csv(path: &Path) -> ImportResult<Workbook> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // 允许行长度不一致
        .from_reader(file);

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("CSV")
        .to_string();
    let mut sheet = Sheet::new(name);

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        for (col_idx, value) in record.iter().enumerate() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            sheet.set_at(
                row_idx as u32 + 1,
                col_idx as u32 + 1,
                CellValue::Text(value.to_string()),
            );
        }
    }

    Ok(Workbook::new(vec![sheet]))
}
