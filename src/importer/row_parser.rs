// ==========================================
// 联系人导入服务 - CSV 行解析器
// ==========================================
// 职责: 原始字节 → 有序扁平记录（表头字符串 → 单元格字符串）
// 规则:
// - 表头去首尾空白，UTF-8 BOM 剥离
// - 重复表头: 首次出现生效，后续列忽略并告警
// - 字段数不一致: 截断/补空串并告警，不中止整个文件
// - 不做类型转换
// ==========================================

use crate::domain::ingest::ParseWarning;
use crate::domain::record::RawRecord;
use crate::importer::error::{IngestError, IngestResultOf};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ==========================================
// CsvRowParser
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct CsvRowParser {
    delimiter: u8,
}

impl Default for CsvRowParser {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvRowParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析内存中的 CSV 内容
    ///
    /// # 错误
    /// - 文件为空（无表头行）
    /// - 只有表头、没有数据行
    /// - 表头行全部为空
    /// - 内容不是合法 UTF-8
    pub fn parse(&self, bytes: impl Into<Vec<u8>>) -> IngestResultOf<ParsedCsv> {
        let mut data: Vec<u8> = bytes.into();
        let byte_size = data.len();

        if data.starts_with(UTF8_BOM) {
            data.drain(..UTF8_BOM.len());
        }

        if let Err(e) = std::str::from_utf8(&data) {
            return Err(IngestError::Parse(format!(
                "file is not valid UTF-8 (byte offset {})",
                e.valid_up_to()
            )));
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_slice());

        let raw_headers = reader
            .headers()
            .map_err(|e| IngestError::Parse(e.to_string()))?
            .clone();

        if raw_headers.is_empty() {
            return Err(IngestError::Parse("file contains no rows".to_string()));
        }

        let trimmed: Vec<String> = raw_headers.iter().map(|h| h.trim().to_string()).collect();
        if trimmed.iter().all(|h| h.is_empty()) {
            return Err(IngestError::Parse("header row is empty".to_string()));
        }

        if reader.records().next().is_none() {
            return Err(IngestError::Parse("file contains no data rows".to_string()));
        }

        let layout = HeaderLayout::build(trimmed);
        debug!(
            columns = layout.width,
            kept = layout.headers.len(),
            "CSV 表头解析完成"
        );

        Ok(ParsedCsv {
            data,
            delimiter: self.delimiter,
            byte_size,
            layout,
        })
    }

    /// 从磁盘读取并解析
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> IngestResultOf<ParsedCsv> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IngestError::Parse(format!(
                "file not found: {}",
                path.display()
            )));
        }
        let bytes = std::fs::read(path)?;
        self.parse(bytes)
    }
}

// ==========================================
// 表头布局
// ==========================================
#[derive(Debug, Clone)]
struct HeaderLayout {
    /// 原始列数
    width: usize,
    /// 保留的 (列下标, 表头)
    columns: Vec<(usize, String)>,
    /// 保留的表头（有序）
    headers: Vec<String>,
    warnings: Vec<ParseWarning>,
}

impl HeaderLayout {
    fn build(raw: Vec<String>) -> Self {
        let width = raw.len();
        let mut columns: Vec<(usize, String)> = Vec::with_capacity(width);
        let mut warnings = Vec::new();

        for (idx, header) in raw.into_iter().enumerate() {
            let header = if header.is_empty() {
                let generated = format!("column_{}", idx + 1);
                warnings.push(ParseWarning {
                    row_number: 0,
                    message: format!("column {} has no header, named '{}'", idx + 1, generated),
                });
                generated
            } else {
                header
            };

            if columns.iter().any(|(_, h)| *h == header) {
                warnings.push(ParseWarning {
                    row_number: 0,
                    message: format!(
                        "duplicate header '{}' in column {} ignored, first occurrence kept",
                        header,
                        idx + 1
                    ),
                });
                continue;
            }
            columns.push((idx, header));
        }

        let headers = columns.iter().map(|(_, h)| h.clone()).collect();
        Self {
            width,
            columns,
            headers,
            warnings,
        }
    }

    fn to_record(&self, record: &StringRecord) -> RawRecord {
        let mut raw = RawRecord::with_capacity(self.columns.len());
        for (idx, header) in &self.columns {
            raw.insert(header.as_str(), record.get(*idx).unwrap_or(""));
        }
        raw
    }
}

// ==========================================
// ParsedCsv - 可重复遍历的解析结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    data: Vec<u8>,
    delimiter: u8,
    byte_size: usize,
    layout: HeaderLayout,
}

/// 单个数据行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// 数据行号（1 起，不含表头）
    pub row_number: usize,
    pub record: RawRecord,
    pub warning: Option<ParseWarning>,
}

impl ParsedCsv {
    /// 保留的表头（去重后，按出现顺序）
    pub fn headers(&self) -> &[String] {
        &self.layout.headers
    }

    /// 原始文件字节数（含 BOM）
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// 表头级告警（重复/空表头）
    pub fn header_warnings(&self) -> &[ParseWarning] {
        &self.layout.warnings
    }

    /// 惰性遍历数据行；每次调用从头开始
    pub fn records(&self) -> impl Iterator<Item = IngestResultOf<ParsedRow>> + '_ {
        let reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(self.data.as_slice());

        let layout = &self.layout;
        reader
            .into_records()
            .enumerate()
            .map(move |(idx, result)| {
                let row_number = idx + 1;
                let record = result.map_err(|e| {
                    IngestError::Parse(format!("row {}: {}", row_number, e))
                })?;

                let warning = match record.len() {
                    n if n == layout.width => None,
                    n if n < layout.width => Some(ParseWarning {
                        row_number,
                        message: format!(
                            "expected {} fields, found {}; padded with empty values",
                            layout.width, n
                        ),
                    }),
                    n => Some(ParseWarning {
                        row_number,
                        message: format!(
                            "expected {} fields, found {}; extra fields dropped",
                            layout.width, n
                        ),
                    }),
                };

                Ok(ParsedRow {
                    row_number,
                    record: layout.to_record(&record),
                    warning,
                })
            })
    }

    /// 收集全部记录与告警（表头告警在前）
    pub fn collect_records(&self) -> IngestResultOf<(Vec<RawRecord>, Vec<ParseWarning>)> {
        let mut records = Vec::new();
        let mut warnings = self.layout.warnings.clone();

        for row in self.records() {
            let row = row?;
            if let Some(w) = row.warning {
                warnings.push(w);
            }
            records.push(row.record);
        }

        Ok((records, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_csv() {
        let parsed = CsvRowParser::new()
            .parse("name,email\nJohn Doe,john@x.com\nJane Doe,jane@x.com")
            .unwrap();

        assert_eq!(parsed.headers(), &["name".to_string(), "email".to_string()]);
        let (records, warnings) = parsed.collect_records().unwrap();
        assert_eq!(records.len(), 2);
        assert!(warnings.is_empty());
        assert_eq!(records[1].get("name"), Some("Jane Doe"));
        assert_eq!(records[1].get("email"), Some("jane@x.com"));
    }

    #[test]
    fn test_records_are_restartable() {
        let parsed = CsvRowParser::new().parse("a,b\n1,2\n3,4\n").unwrap();
        assert_eq!(parsed.records().count(), 2);
        assert_eq!(parsed.records().count(), 2);

        let first: Vec<usize> = parsed
            .records()
            .map(|r| r.unwrap().row_number)
            .collect();
        assert_eq!(first, vec![1, 2]);
    }

    #[test]
    fn test_bom_and_header_whitespace_are_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b" name , email\nAnn,ann@x.com\n");
        let parsed = CsvRowParser::new().parse(bytes).unwrap();
        assert_eq!(parsed.headers(), &["name".to_string(), "email".to_string()]);
    }

    #[test]
    fn test_empty_file_is_parse_error() {
        let err = CsvRowParser::new().parse("").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_header_only_file_is_parse_error() {
        let err = CsvRowParser::new().parse("name,email\n").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
        assert!(err.to_string().contains("no data rows"));

        // 空行不算数据行
        let err = CsvRowParser::new().parse("name,email\n\n\n").unwrap_err();
        assert!(err.to_string().contains("no data rows"));
    }

    #[test]
    fn test_blank_header_row_is_parse_error() {
        let err = CsvRowParser::new().parse(" , ,\n1,2,3\n").unwrap_err();
        assert!(err.to_string().contains("header row is empty"));
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let err = CsvRowParser::new()
            .parse(vec![b'a', b'\n', 0xFF, 0xFE])
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_short_and_long_rows_are_padded_or_truncated() {
        let parsed = CsvRowParser::new()
            .parse("a,b,c\n1,2\n4,5,6,7\n8,9,10\n")
            .unwrap();
        let (records, warnings) = parsed.collect_records().unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("c"), Some(""));
        assert_eq!(records[1].len(), 3);
        assert_eq!(records[1].get("c"), Some("6"));

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].row_number, 1);
        assert!(warnings[0].message.contains("padded"));
        assert_eq!(warnings[1].row_number, 2);
        assert!(warnings[1].message.contains("dropped"));
    }

    #[test]
    fn test_duplicate_header_first_occurrence_wins() {
        let parsed = CsvRowParser::new()
            .parse("email,name,email\nfirst@x.com,Ann,second@x.com\n")
            .unwrap();

        assert_eq!(parsed.headers().len(), 2);
        assert_eq!(parsed.header_warnings().len(), 1);
        assert_eq!(parsed.header_warnings()[0].row_number, 0);

        let (records, _) = parsed.collect_records().unwrap();
        assert_eq!(records[0].get("email"), Some("first@x.com"));
        assert_eq!(records[0].columns().collect::<Vec<_>>(), vec!["email", "name"]);
    }

    #[test]
    fn test_values_are_not_coerced() {
        let parsed = CsvRowParser::new().parse("zip,amount\n00501,1e3\n").unwrap();
        let (records, _) = parsed.collect_records().unwrap();
        assert_eq!(records[0].get("zip"), Some("00501"));
        assert_eq!(records[0].get("amount"), Some("1e3"));
    }

    #[test]
    fn test_quoted_fields_with_commas_and_newlines() {
        let parsed = CsvRowParser::new()
            .parse("name,notes\n\"Doe, John\",\"line one\nline two\"\n")
            .unwrap();
        let (records, warnings) = parsed.collect_records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(warnings.is_empty());
        assert_eq!(records[0].get("name"), Some("Doe, John"));
        assert_eq!(records[0].get("notes"), Some("line one\nline two"));
    }

    #[test]
    fn test_parse_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "first_name,last_name").unwrap();
        writeln!(temp_file, "Ann,Lee").unwrap();

        let parsed = CsvRowParser::new().parse_file(temp_file.path()).unwrap();
        assert_eq!(parsed.records().count(), 1);
        assert!(parsed.byte_size() > 0);
    }

    #[test]
    fn test_parse_file_missing() {
        let err = CsvRowParser::new()
            .parse_file("/definitely/not/here.csv")
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }
}
