use crate::config::SheetConfig;
use crate::error::PipelineError;
use crate::plan::cell::CellValue;

static EMPTY_CELL: CellValue = CellValue::Empty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetRole {
    Regular,
    SLevel,
    Summary,
}

impl SheetRole {
    pub const ALL: [SheetRole; 3] = [SheetRole::Regular, SheetRole::SLevel, SheetRole::Summary];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::SLevel => "s_level",
            Self::Summary => "summary",
        }
    }
}

/// One cleaned source sheet. Rows are positional so repeated headers keep
/// every column.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Index of the first column whose header equals `header`.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|candidate| candidate == header)
    }

    pub fn raw_rows(&self) -> impl Iterator<Item = RawRow<'_>> {
        self.rows.iter().enumerate().map(|(idx, cells)| RawRow {
            cells,
            // header is row 1
            number: idx + 2,
        })
    }
}

/// Borrowed view of one data row.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    pub cells: &'a [CellValue],
    pub number: usize,
}

impl<'a> RawRow<'a> {
    pub fn cell(&self, idx: usize) -> &'a CellValue {
        self.cells.get(idx).unwrap_or(&EMPTY_CELL)
    }
}

/// Sheets handed over by a loader, keyed by role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub regular: Option<SheetTable>,
    pub s_level: Option<SheetTable>,
    pub summary: Option<SheetTable>,
}

impl Snapshot {
    pub fn get(&self, role: SheetRole) -> Option<&SheetTable> {
        match role {
            SheetRole::Regular => self.regular.as_ref(),
            SheetRole::SLevel => self.s_level.as_ref(),
            SheetRole::Summary => self.summary.as_ref(),
        }
    }

    /// Store a sheet under `role`. The first sheet recognized for a role wins.
    pub fn insert(&mut self, role: SheetRole, table: SheetTable) -> bool {
        let slot = match role {
            SheetRole::Regular => &mut self.regular,
            SheetRole::SLevel => &mut self.s_level,
            SheetRole::Summary => &mut self.summary,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(table);
        true
    }

    pub fn require(&self, role: SheetRole, sheets: &SheetConfig) -> Result<&SheetTable, PipelineError> {
        self.get(role).ok_or_else(|| PipelineError::SourceMissing {
            sheet: sheets.display_name(role).to_string(),
            cause: format!(
                "no sheet named any of [{}] in the input",
                sheets.aliases(role).join(", ")
            ),
        })
    }

    pub fn sheets(&self) -> impl Iterator<Item = (SheetRole, &SheetTable)> {
        SheetRole::ALL
            .into_iter()
            .filter_map(|role| self.get(role).map(|table| (role, table)))
    }
}

/// Ordered header aliases resolved once against a header row.
#[derive(Debug, Clone)]
pub struct HeaderResolver {
    candidates: Vec<usize>,
}

impl HeaderResolver {
    pub fn new(aliases: &[String], headers: &[String]) -> Self {
        let candidates = aliases
            .iter()
            .filter_map(|alias| headers.iter().position(|header| header == alias))
            .collect();
        Self { candidates }
    }

    pub fn is_present(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// First populated candidate cell in `row`.
    pub fn value<'a>(&self, row: &RawRow<'a>) -> Option<&'a CellValue> {
        self.candidates
            .iter()
            .map(|idx| row.cell(*idx))
            .find(|cell| !cell.is_blank())
    }
}

/// Generic named-column table: the upload, summary and merge outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// View a loaded sheet as a table (legacy summary input).
    pub fn from_sheet(sheet: &SheetTable) -> Self {
        let width = sheet.headers.len();
        let rows = sheet
            .rows
            .iter()
            .map(|row| {
                let mut cells = row.clone();
                cells.resize(width, CellValue::Empty);
                cells
            })
            .collect();
        Self {
            columns: sheet.headers.clone(),
            rows,
        }
    }
}
