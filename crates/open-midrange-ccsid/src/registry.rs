//! Runtime lookup of conversion tables by CCSID or encoding name.
//!
//! Tables are built lazily on first request and shared afterwards. The
//! registry is safe to use from many threads at once; concurrent first
//! requests for the same CCSID build at most one table that every caller
//! then sees.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::CcsidError;
use crate::table::ConvTable;
use crate::Result;

/// CCSIDs with a bundled table and their canonical encoding names.
const ENCODINGS: &[(u16, &str)] = &[
    (37, "Cp037"),
    (367, "ASCII"),
    (425, "Cp425"),
    (500, "Cp500"),
    (819, "ISO8859_1"),
    (833, "Cp833"),
    (834, "Cp834"),
    (874, "Cp874"),
    (912, "ISO8859_2"),
    (923, "ISO8859_15"),
    (933, "Cp933"),
    (943, "SJIS"),
    (1047, "Cp1047"),
    (1140, "Cp1140"),
    (1148, "Cp1148"),
    (1164, "Cp1164"),
    (1200, "UTF-16BE"),
    (1208, "UTF-8"),
    (1250, "Cp1250"),
    (1251, "Cp1251"),
    (1252, "Cp1252"),
    (1253, "Cp1253"),
    (1254, "Cp1254"),
    (1255, "Cp1255"),
    (1256, "Cp1256"),
    (1257, "Cp1257"),
    (1258, "Cp1258"),
    (1386, "GBK"),
    (13488, "UnicodeBigUnmarked"),
];

/// Common names that do not carry the CCSID number.
const ALIASES: &[(&str, u16)] = &[
    ("UTF-8", 1208),
    ("UTF8", 1208),
    ("UTF-16BE", 1200),
    ("UTF-16", 1200),
    ("UTF16", 1200),
    ("UNICODEBIGUNMARKED", 13488),
    ("UCS-2", 13488),
    ("UCS2", 13488),
    ("ISO-8859-1", 819),
    ("ISO8859_1", 819),
    ("LATIN1", 819),
    ("ISO-8859-2", 912),
    ("ISO8859_2", 912),
    ("ISO-8859-15", 923),
    ("ISO8859_15", 923),
    ("US-ASCII", 367),
    ("ASCII", 367),
    ("SHIFT_JIS", 943),
    ("SJIS", 943),
    ("GBK", 1386),
];

/// Prefixes stripped from numeric encoding names.
const PREFIXES: &[&str] = &["IBM-", "IBM", "CP", "EBCDIC-", "CCSID", "WINDOWS-"];

/// Canonical encoding name for a CCSID with a bundled table.
pub fn encoding_for_ccsid(ccsid: u16) -> Option<&'static str> {
    ENCODINGS
        .iter()
        .find(|&&(c, _)| c == ccsid)
        .map(|&(_, name)| name)
}

/// CCSID for an encoding name.
///
/// Accepts canonical names ("Cp037"), IBM forms ("IBM-037", "IBM037",
/// "EBCDIC-037", "CCSID37"), Windows names ("windows-1252") and the common
/// Unicode and ISO aliases. Matching is case-insensitive.
pub fn ccsid_for_encoding(name: &str) -> Option<u16> {
    let upper = name.trim().to_ascii_uppercase();
    if let Some(&(_, ccsid)) = ALIASES.iter().find(|&&(alias, _)| alias == upper) {
        return Some(ccsid);
    }
    let digits = PREFIXES
        .iter()
        .find_map(|prefix| upper.strip_prefix(prefix))
        .unwrap_or(&upper);
    let ccsid = digits.parse::<u16>().ok()?;
    encoding_for_ccsid(ccsid).map(|_| ccsid)
}

/// Shared cache of conversion tables.
///
/// # Example
///
/// ```
/// use open_midrange_ccsid::TableRegistry;
///
/// let registry = TableRegistry::new();
/// let cp037 = registry.table(37).unwrap();
/// assert_eq!(cp037.decode(&[0xC1]), "A");
///
/// let same = registry.table_by_name("IBM-037").unwrap();
/// assert!(std::sync::Arc::ptr_eq(&cp037, &same));
/// ```
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: DashMap<u16, Arc<ConvTable>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the table for a CCSID, building it on first use.
    ///
    /// # Errors
    /// Returns `CcsidError::UnsupportedCcsid` if no table is bundled.
    pub fn table(&self, ccsid: u16) -> Result<Arc<ConvTable>> {
        if let Some(table) = self.tables.get(&ccsid) {
            return Ok(Arc::clone(table.value()));
        }
        let entry = self.tables.entry(ccsid).or_try_insert_with(|| {
            let table = ConvTable::bundled(ccsid)?;
            debug!(
                ccsid,
                encoding = table.encoding(),
                category = %table.category(),
                "Built conversion table"
            );
            Ok::<_, CcsidError>(Arc::new(table))
        })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Get the table for an encoding name.
    ///
    /// # Errors
    /// Returns `CcsidError::UnsupportedEncoding` if the name is not recognized.
    pub fn table_by_name(&self, name: &str) -> Result<Arc<ConvTable>> {
        let ccsid =
            ccsid_for_encoding(name).ok_or_else(|| CcsidError::UnsupportedEncoding(name.to_string()))?;
        self.table(ccsid)
    }

    /// All CCSIDs with a bundled table, ascending.
    pub fn supported_ccsids(&self) -> Vec<u16> {
        ENCODINGS.iter().map(|&(ccsid, _)| ccsid).collect()
    }

    pub fn is_supported(&self, ccsid: u16) -> bool {
        encoding_for_ccsid(ccsid).is_some()
    }

    /// Number of tables built so far.
    pub fn cached_count(&self) -> usize {
        self.tables.len()
    }
}
