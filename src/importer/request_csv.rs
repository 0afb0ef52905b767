// ==========================================
// 飞行训练排班系统 - 训练请求 CSV 解析
// ==========================================
// 表头: request_id, student_id, sortie_type, required_stage,
//       window_start, window_end, duration_minutes, aircraft_type(可选)
// 时间格式: YYYY-MM-DD HH:MM[:SS] 或 ISO (T 分隔)
// 行号从 2 开始 (第 1 行为表头)
// ==========================================

use crate::domain::sortie::SortieRequest;
use crate::domain::types::{SortieType, Stage, TimeWindow};
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

pub struct RequestCsvParser;

impl RequestCsvParser {
    /// 解析 CSV 文件
    pub fn parse_file(&self, path: &Path) -> ImportResult<Vec<SortieRequest>> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if let Some(ext) = path.extension() {
            if ext != "csv" {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }
        let file = File::open(path)?;
        self.parse_reader(file)
    }

    /// 解析任意输入流
    pub fn parse_reader<R: Read>(&self, reader: R) -> ImportResult<Vec<SortieRequest>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许可选列缺失
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut requests = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let row_number = idx + 2;

            let row: HashMap<&str, &str> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.as_str(), v.trim()))
                .collect();

            // 跳过完全空白的行
            if row.values().all(|v| v.is_empty()) {
                continue;
            }

            requests.push(map_row(row_number, &row)?);
        }

        tracing::debug!(requests = requests.len(), "训练请求 CSV 解析完成");
        Ok(requests)
    }
}

fn map_row(row_number: usize, row: &HashMap<&str, &str>) -> ImportResult<SortieRequest> {
    let request_id = required(row_number, row, "request_id")?;
    let student_id = required(row_number, row, "student_id")?;

    let raw_type = required(row_number, row, "sortie_type")?;
    let sortie_type =
        SortieType::parse(raw_type).ok_or_else(|| ImportError::TypeConversionError {
            row: row_number,
            field: "sortie_type".to_string(),
            message: format!("未知科目类型 {}", raw_type),
        })?;

    let raw_stage = required(row_number, row, "required_stage")?;
    let required_stage = raw_stage
        .parse::<u8>()
        .ok()
        .and_then(Stage::new)
        .ok_or_else(|| ImportError::TypeConversionError {
            row: row_number,
            field: "required_stage".to_string(),
            message: format!("训练阶段无效 {}", raw_stage),
        })?;

    let window = TimeWindow::new(
        parse_datetime(row_number, row, "window_start")?,
        parse_datetime(row_number, row, "window_end")?,
    );

    let raw_duration = required(row_number, row, "duration_minutes")?;
    let duration_minutes =
        raw_duration
            .parse::<i64>()
            .map_err(|e| ImportError::TypeConversionError {
                row: row_number,
                field: "duration_minutes".to_string(),
                message: e.to_string(),
            })?;

    let aircraft_type = row
        .get("aircraft_type")
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string());

    Ok(SortieRequest {
        request_id: request_id.to_string(),
        student_id: student_id.to_string(),
        sortie_type,
        required_stage,
        window,
        duration_minutes,
        aircraft_type,
    })
}

fn required<'a>(
    row_number: usize,
    row: &HashMap<&str, &'a str>,
    field: &str,
) -> ImportResult<&'a str> {
    match row.get(field) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ImportError::MissingField {
            row: row_number,
            field: field.to_string(),
        }),
    }
}

fn parse_datetime(
    row_number: usize,
    row: &HashMap<&str, &str>,
    field: &str,
) -> ImportResult<NaiveDateTime> {
    let raw = required(row_number, row, field)?;
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ImportError::DateTimeFormatError {
            row: row_number,
            field: field.to_string(),
            value: raw.to_string(),
        })
}
