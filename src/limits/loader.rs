//! Limits table loading.
//!
//! Expected CSV format:
//! ```csv
//! Platform,Currency,Lower Limit,Upper Limit
//! binance,usdt,1000,50000
//! kraken,btc,-1,10
//! ```
//!
//! Column order is free; columns are matched by header name. A bound of
//! `-1` or an empty cell means no bound is configured. Cells may be quoted,
//! and quoted bounds may carry thousands separators (`"10,000"`), as
//! spreadsheet exports write them. A quoted cell cannot span lines.

use crate::error::ConfigError;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const COL_PLATFORM: &str = "platform";
const COL_CURRENCY: &str = "currency";
const COL_LOWER: &str = "lower limit";
const COL_UPPER: &str = "upper limit";

/// Value written in the source for "no bound".
const NO_BOUND_SENTINEL: Decimal = Decimal::NEGATIVE_ONE;

/// Lowercased (platform, currency) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LimitKey {
    pub platform: String,
    pub currency: String,
}

impl LimitKey {
    /// Build a key, normalizing both parts to lowercase.
    pub fn new(platform: &str, currency: &str) -> Self {
        Self {
            platform: platform.trim().to_lowercase(),
            currency: currency.trim().to_lowercase(),
        }
    }
}

/// Acceptable range for one key. `None` means no bound on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitEntry {
    pub lower: Option<Decimal>,
    pub upper: Option<Decimal>,
}

impl LimitEntry {
    pub fn new(lower: Option<Decimal>, upper: Option<Decimal>) -> Self {
        Self { lower, upper }
    }

    /// Entry for a key with nothing configured.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Lower bound above the upper bound. Such an entry can flag a balance
    /// as both below and above its range.
    pub fn is_inverted(&self) -> bool {
        matches!((self.lower, self.upper), (Some(lo), Some(hi)) if lo > hi)
    }
}

/// Immutable lookup table of configured limits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitTable {
    entries: HashMap<LimitKey, LimitEntry>,
}

impl LimitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the limits for a key.
    pub fn insert(&mut self, platform: &str, currency: &str, entry: LimitEntry) {
        self.entries.insert(LimitKey::new(platform, currency), entry);
    }

    /// Limits for a key; a miss yields an unbounded entry.
    pub fn lookup(&self, platform: &str, currency: &str) -> LimitEntry {
        self.entries
            .get(&LimitKey::new(platform, currency))
            .copied()
            .unwrap_or_default()
    }

    /// Keys whose lower bound exceeds the upper bound, sorted.
    pub fn inverted_entries(&self) -> Vec<(LimitKey, LimitEntry)> {
        let mut inverted: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_inverted())
            .map(|(k, e)| (k.clone(), *e))
            .collect();
        inverted.sort_by(|a, b| a.0.cmp(&b.0));
        inverted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a limits table from CSV content.
    pub fn from_csv_content(content: &str) -> Result<Self, ConfigError> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| ConfigError::LimitsSchema("limits source is empty".to_string()))?;
        let columns = HeaderIndex::parse(header)?;

        let mut table = Self::new();
        for (line_num, line) in lines {
            let fields = split_fields(line).map_err(|reason| ConfigError::LimitsParse {
                line: line_num + 1,
                reason: reason.to_string(),
            })?;
            if fields.len() < columns.width {
                return Err(ConfigError::LimitsParse {
                    line: line_num + 1,
                    reason: format!(
                        "expected {} fields, found {}",
                        columns.width,
                        fields.len()
                    ),
                });
            }
            let field = |idx: usize| fields[idx].as_str();

            let platform = field(columns.platform);
            let currency = field(columns.currency);
            if platform.is_empty() || currency.is_empty() {
                return Err(ConfigError::LimitsParse {
                    line: line_num + 1,
                    reason: "platform and currency are required".to_string(),
                });
            }

            let lower = parse_bound(field(columns.lower), line_num + 1)?;
            let upper = parse_bound(field(columns.upper), line_num + 1)?;

            table.insert(platform, currency, LimitEntry::new(lower, upper));
        }

        Ok(table)
    }
}

/// Source of the limits table.
pub trait LimitSource: Send + Sync {
    /// Load a complete table. Called at startup and on every refresh.
    fn load(&self) -> Result<LimitTable, ConfigError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Limits table stored in a CSV file.
#[derive(Debug, Clone)]
pub struct CsvLimitSource {
    path: PathBuf,
}

impl CsvLimitSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl LimitSource for CsvLimitSource {
    fn load(&self) -> Result<LimitTable, ConfigError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|source| ConfigError::LimitsRead {
                path: self.path.display().to_string(),
                source,
            })?;
        LimitTable::from_csv_content(&content)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Column positions of the required headers.
struct HeaderIndex {
    /// Number of header columns; every row must have at least this many
    width: usize,
    platform: usize,
    currency: usize,
    lower: usize,
    upper: usize,
}

impl HeaderIndex {
    fn parse(header: &str) -> Result<Self, ConfigError> {
        let names: Vec<String> = split_fields(header.trim_start_matches('\u{feff}'))
            .map_err(|reason| ConfigError::LimitsSchema(format!("header: {}", reason)))?
            .into_iter()
            .map(|h| h.to_lowercase())
            .collect();

        let position = |wanted: &str| {
            names.iter().position(|n| n == wanted).ok_or_else(|| {
                ConfigError::LimitsSchema(format!("missing column '{}'", title_case(wanted)))
            })
        };

        Ok(Self {
            width: names.len(),
            platform: position(COL_PLATFORM)?,
            currency: position(COL_CURRENCY)?,
            lower: position(COL_LOWER)?,
            upper: position(COL_UPPER)?,
        })
    }
}

/// Split one CSV record, honoring double-quoted cells and `""` escapes.
fn split_fields(line: &str) -> Result<Vec<String>, &'static str> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            (true, '"') => quoted = false,
            (false, '"') if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            (false, ',') => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }

    if quoted {
        return Err("unterminated quoted field");
    }
    fields.push(field.trim().to_string());
    Ok(fields)
}

fn parse_bound(raw: &str, line: usize) -> Result<Option<Decimal>, ConfigError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    let value = Decimal::from_str(&digits)
        .or_else(|_| Decimal::from_scientific(&digits))
        .map_err(|e| ConfigError::LimitsParse {
            line,
            reason: format!("invalid limit '{}': {}", raw, e),
        })?;
    if value == NO_BOUND_SENTINEL {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "Platform,Currency,Lower Limit,Upper Limit
Binance,USDT,1000,50000
kraken,btc,-1,10
Bitfinex,ETH,5,
";

    #[test]
    fn test_csv_parsing() {
        let table = LimitTable::from_csv_content(SAMPLE).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(
            table.lookup("binance", "usdt"),
            LimitEntry::new(Some(dec!(1000)), Some(dec!(50000)))
        );
        assert_eq!(table.lookup("kraken", "btc"), LimitEntry::new(None, Some(dec!(10))));
        assert_eq!(table.lookup("bitfinex", "eth"), LimitEntry::new(Some(dec!(5)), None));
    }

    #[test]
    fn test_keys_are_case_normalized() {
        let table = LimitTable::from_csv_content(SAMPLE).unwrap();
        assert_eq!(table.lookup("BINANCE", "Usdt"), table.lookup("binance", "usdt"));
        assert!(table.lookup("binance", "usdt").lower.is_some());
    }

    #[test]
    fn test_miss_is_unbounded() {
        let table = LimitTable::from_csv_content(SAMPLE).unwrap();
        assert_eq!(table.lookup("okx", "sol"), LimitEntry::unbounded());
    }

    #[test]
    fn test_columns_matched_by_name() {
        let csv = "Upper Limit,Lower Limit,Currency,Platform\n100,10,usdt,binance\n";
        let table = LimitTable::from_csv_content(csv).unwrap();
        assert_eq!(
            table.lookup("binance", "usdt"),
            LimitEntry::new(Some(dec!(10)), Some(dec!(100)))
        );
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let csv = "Platform,Currency,Lower Limit\nbinance,usdt,10\n";
        let err = LimitTable::from_csv_content(csv).unwrap_err();
        match err {
            ConfigError::LimitsSchema(msg) => assert!(msg.contains("Upper Limit")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_source_is_schema_error() {
        assert!(matches!(
            LimitTable::from_csv_content("\n\n"),
            Err(ConfigError::LimitsSchema(_))
        ));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let csv = "Platform,Currency,Lower Limit,Upper Limit\nbinance,usdt,10,20\nkraken,btc,ten,20\n";
        let err = LimitTable::from_csv_content(csv).unwrap_err();
        assert!(matches!(err, ConfigError::LimitsParse { line: 3, .. }));
    }

    #[test]
    fn test_quoted_cells_with_thousands_separators() {
        let csv = "Platform,Currency,Lower Limit,Upper Limit\nbinance,usdt,\"10,000\",\"500,000\"\n";
        let table = LimitTable::from_csv_content(csv).unwrap();
        assert_eq!(
            table.lookup("binance", "usdt"),
            LimitEntry::new(Some(dec!(10000)), Some(dec!(500000)))
        );
    }

    #[test]
    fn test_quoted_header_and_escaped_quotes() {
        let csv = "\u{feff}\"Platform\",\"Currency\",\"Lower Limit\",\"Upper Limit\"\n\"Kraken \"\"Pro\"\"\",btc,\"-1\",\"1,250.5\"\n";
        let table = LimitTable::from_csv_content(csv).unwrap();
        assert_eq!(
            table.lookup("kraken \"pro\"", "btc"),
            LimitEntry::new(None, Some(dec!(1250.5)))
        );
    }

    #[test]
    fn test_short_row_is_parse_error() {
        let csv = "Platform,Currency,Lower Limit,Upper Limit\nbinance,usdt,10,20\nkraken,btc,5\n";
        match LimitTable::from_csv_content(csv).unwrap_err() {
            ConfigError::LimitsParse { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("expected 4 fields, found 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_quote_is_parse_error() {
        let csv = "Platform,Currency,Lower Limit,Upper Limit\nbinance,usdt,\"10,20\n";
        assert!(matches!(
            LimitTable::from_csv_content(csv),
            Err(ConfigError::LimitsParse { line: 2, .. })
        ));
    }

    #[test]
    fn test_last_duplicate_wins() {
        let csv = "Platform,Currency,Lower Limit,Upper Limit\nbinance,usdt,1,2\nBinance,USDT,3,4\n";
        let table = LimitTable::from_csv_content(csv).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("binance", "usdt").lower, Some(dec!(3)));
    }

    #[test]
    fn test_inverted_entries() {
        let csv = "Platform,Currency,Lower Limit,Upper Limit\nbinance,usdt,1000,100\nkraken,btc,1,2\n";
        let table = LimitTable::from_csv_content(csv).unwrap();
        let inverted = table.inverted_entries();
        assert_eq!(inverted.len(), 1);
        assert_eq!(inverted[0].0, LimitKey::new("binance", "usdt"));
    }

    #[test]
    fn test_csv_source_missing_file() {
        let source = CsvLimitSource::new("/nonexistent/balance_limits.csv");
        assert!(matches!(source.load(), Err(ConfigError::LimitsRead { .. })));
    }

    #[test]
    fn test_csv_source_reads_file() {
        let path = std::env::temp_dir().join(format!(
            "balance_limits_{}_{}.csv",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::write(&path, SAMPLE).unwrap();

        let table = CsvLimitSource::new(&path).load().unwrap();
        assert_eq!(table.len(), 3);

        std::fs::remove_file(&path).ok();
    }
}
