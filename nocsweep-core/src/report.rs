//! Report workbook assembly.
//!
//! One workbook per weight scenario: one sheet per injection rate plus a
//! summary sheet. The derived latency column is a live, re-evaluable
//! formula (`=D<r>-C<r>`), not a baked number, so a user can open the
//! report and re-derive the value interactively. The summary sheet links
//! each rate's average latency by sheet-qualified cell reference rather
//! than copying the value.
//!
//! Sheets are built as a typed in-memory model first and rendered to
//! xlsx in a separate pass, which keeps the formula wiring testable
//! without opening workbook files.

use std::path::Path;

use rust_xlsxwriter::{Formula, Workbook};

use crate::collect::{ResultCollector, TransactionRecord};
use crate::config::SystemParams;
use crate::error::Result;
use crate::params::{InjectionRate, WeightPair};

/// Fixed header of every rate sheet.
pub const RATE_SHEET_HEADER: [&str; 7] = [
    "ID",
    "Type",
    "Packet Sent At",
    "Packet Received At",
    "Received X Co-Ord",
    "Received Y Co-Ord",
    "Delta CC",
];

/// Name of the trailing summary sheet.
pub const SUMMARY_SHEET_NAME: &str = "Results and System Info";

/// A single typed cell of the report model.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    /// A live formula expression, `=` included.
    Formula(String),
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

/// In-memory report model for one weight scenario.
#[derive(Debug, Clone)]
pub struct ReportBook {
    pub sheets: Vec<Sheet>,
}

/// Builds the report for one weight scenario from the per-rate
/// aggregates.
pub struct ReportBuilder<'a> {
    params: &'a SystemParams,
    rates: &'a [InjectionRate],
}

impl<'a> ReportBuilder<'a> {
    pub fn new(params: &'a SystemParams, rates: &'a [InjectionRate]) -> Self {
        ReportBuilder { params, rates }
    }

    /// Deterministic workbook file name for a weight scenario.
    pub fn file_name(weights: &WeightPair) -> String {
        format!(
            "results_mixed_weighted_acc{}_apx{}.xlsx",
            weights.accurate, weights.approximate
        )
    }

    pub fn rate_sheet_name(rate: &InjectionRate) -> String {
        format!("IR = {}", rate.label)
    }

    /// Assembles the full book: one sheet per rate in input order, then
    /// the summary sheet.
    pub fn build(&self, weights: &WeightPair, collector: &ResultCollector) -> Result<ReportBook> {
        let mut sheets = Vec::with_capacity(self.rates.len() + 1);
        let mut average_cells = Vec::with_capacity(self.rates.len());

        for rate in self.rates {
            // a point that failed under the `continue` policy leaves no
            // aggregate behind; its sheet still exists, with no data rows
            let records = if collector.aggregate_path(rate).is_file() {
                collector.read_aggregate(rate)?
            } else {
                warn!("no aggregate for rate {}, emitting empty sheet", rate.label);
                Vec::new()
            };
            let (sheet, average_cell) = rate_sheet(rate, &records);
            sheets.push(sheet);
            average_cells.push(average_cell);
        }

        sheets.push(self.summary_sheet(weights, &average_cells));
        Ok(ReportBook { sheets })
    }

    fn summary_sheet(&self, weights: &WeightPair, average_cells: &[Option<String>]) -> Sheet {
        let text = |s: &str| Cell::Text(s.to_string());
        let mut rows = vec![
            vec![text("System Info")],
            vec![text("X Size"), Cell::Int(self.params.x_size as i64)],
            vec![text("Y Size"), Cell::Int(self.params.y_size as i64)],
            vec![
                text("Number of Injected Packets Per Node"),
                Cell::Int(self.params.packet_qty as i64),
            ],
            vec![
                text("Number of Ticks Per Period"),
                Cell::Int(self.params.period_size as i64),
            ],
            vec![text("Accurate Weight"), Cell::Int(weights.accurate as i64)],
            vec![
                text("Approximate Weight"),
                Cell::Int(weights.approximate as i64),
            ],
            vec![text("Results")],
            vec![text("Injection Rate"), text("Latency")],
        ];
        for (rate, average_cell) in self.rates.iter().zip(average_cells) {
            let latency = match average_cell {
                Some(cell) => {
                    Cell::Formula(format!("='{}'!{}", Self::rate_sheet_name(rate), cell))
                }
                None => Cell::Text(String::new()),
            };
            rows.push(vec![Cell::Text(rate.label.clone()), latency]);
        }
        Sheet {
            name: SUMMARY_SHEET_NAME.to_string(),
            rows,
        }
    }
}

/// Builds one rate sheet and returns it together with the address of its
/// average cell (referenced from the summary sheet), `None` when the
/// sheet holds no data rows.
fn rate_sheet(rate: &InjectionRate, records: &[TransactionRecord]) -> (Sheet, Option<String>) {
    let mut rows = Vec::with_capacity(records.len() + 2);
    rows.push(
        RATE_SHEET_HEADER
            .iter()
            .map(|h| Cell::Text(h.to_string()))
            .collect(),
    );

    for (i, record) in records.iter().enumerate() {
        // first data row is spreadsheet row 2
        let row = i + 2;
        rows.push(vec![
            Cell::Int(record.id),
            Cell::Text(record.kind.clone()),
            Cell::Int(record.sent_tick),
            Cell::Int(record.received_tick),
            Cell::Int(record.recv_x),
            Cell::Int(record.recv_y),
            Cell::Formula(format!("=D{}-C{}", row, row)),
        ]);
    }

    // with no data rows an average formula would reference its own row;
    // the sheet stays header-only and the summary cell stays empty
    let average_cell = if records.is_empty() {
        None
    } else {
        let last_data_row = records.len() + 1;
        rows.push(vec![
            Cell::Text("Average".to_string()),
            Cell::Text(String::new()),
            Cell::Text(String::new()),
            Cell::Text(String::new()),
            Cell::Text(String::new()),
            Cell::Text(String::new()),
            Cell::Formula(format!("=AVERAGE(G2:G{})", last_data_row)),
        ]);
        Some(format!("G{}", last_data_row + 1))
    };

    (
        Sheet {
            name: ReportBuilder::rate_sheet_name(rate),
            rows,
        },
        average_cell,
    )
}

/// Renders the book to an xlsx workbook on disk. This is the rendering
/// strategy that materializes derived fields as live formulas; a target
/// format without formula support would bake literals here instead.
pub fn write_xlsx(book: &ReportBook, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    for sheet in &book.sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        for (r, row) in sheet.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(s) => worksheet.write_string(r as u32, c as u16, s)?,
                    Cell::Int(v) => worksheet.write_number(r as u32, c as u16, *v as f64)?,
                    Cell::Formula(f) => {
                        worksheet.write_formula(r as u32, c as u16, Formula::new(f))?
                    }
                };
            }
        }
    }
    workbook.save(path)?;
    info!("wrote workbook {:?}", path);
    Ok(())
}

#[cfg(test)]
fn fixture_book(
    params: SystemParams,
    rate_labels: &[&str],
) -> (ReportBook, Vec<InjectionRate>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();

    let rates: Vec<InjectionRate> = rate_labels
        .iter()
        .map(|l| InjectionRate {
            label: l.to_string(),
            value: l.parse().unwrap(),
        })
        .collect();
    for rate in &rates {
        let mut content = String::new();
        for i in 0..params.expected_records() {
            content.push_str(&format!("{},acc,{},{},0,0\n", i, i, i + 10));
        }
        std::fs::write(collector.aggregate_path(rate), content).unwrap();
    }

    let weights = WeightPair {
        accurate: 80,
        approximate: 20,
    };
    let builder = ReportBuilder::new(&params, &rates);
    let book = builder.build(&weights, &collector).unwrap();
    (book, rates, dir)
}

#[test]
fn sheet_count_is_rates_plus_one() {
    let params = SystemParams {
        x_size: 2,
        y_size: 2,
        packet_qty: 5,
        period_size: 100,
    };
    let (book, _, _dir) = fixture_book(params, &["0.10", "0.20"]);
    assert_eq!(book.sheets.len(), 3);
    assert_eq!(book.sheets[0].name, "IR = 0.10");
    assert_eq!(book.sheets[1].name, "IR = 0.20");
    assert_eq!(book.sheets[2].name, SUMMARY_SHEET_NAME);
}

#[test]
fn rate_sheet_formula_wiring() {
    let params = SystemParams {
        x_size: 2,
        y_size: 2,
        packet_qty: 5,
        period_size: 100,
    };
    let (book, _, _dir) = fixture_book(params, &["0.10", "0.20"]);

    let sheet = &book.sheets[0];
    // header + 20 data rows + average row
    assert_eq!(sheet.rows.len(), 22);
    assert_eq!(sheet.rows[0][0], Cell::Text("ID".to_string()));
    assert_eq!(sheet.rows[0][6], Cell::Text("Delta CC".to_string()));
    // latency is a live cell-reference formula, never a literal
    assert_eq!(sheet.rows[1][6], Cell::Formula("=D2-C2".to_string()));
    assert_eq!(sheet.rows[20][6], Cell::Formula("=D21-C21".to_string()));
    assert_eq!(
        sheet.rows[21][6],
        Cell::Formula("=AVERAGE(G2:G21)".to_string())
    );
    assert_eq!(sheet.rows[21][0], Cell::Text("Average".to_string()));

    // summary latency cells reference each rate sheet's average cell
    let summary = &book.sheets[2];
    assert_eq!(
        summary.rows[9],
        vec![
            Cell::Text("0.10".to_string()),
            Cell::Formula("='IR = 0.10'!G22".to_string()),
        ]
    );
    assert_eq!(
        summary.rows[10][1],
        Cell::Formula("='IR = 0.20'!G22".to_string())
    );
}

#[test]
fn summary_references_row_data_rows_plus_two() {
    // 5 data rows puts the average cell, and thus the cross-sheet
    // reference, at G7
    let params = SystemParams {
        x_size: 1,
        y_size: 1,
        packet_qty: 5,
        period_size: 100,
    };
    let (book, _, _dir) = fixture_book(params, &["0.10", "0.20"]);
    let summary = book.sheets.last().unwrap();
    assert_eq!(
        summary.rows[9][1],
        Cell::Formula("='IR = 0.10'!G7".to_string())
    );
    assert_eq!(
        summary.rows[10][1],
        Cell::Formula("='IR = 0.20'!G7".to_string())
    );
}

#[test]
fn summary_lists_system_parameters() {
    let params = SystemParams {
        x_size: 2,
        y_size: 2,
        packet_qty: 5,
        period_size: 100,
    };
    let (book, _, _dir) = fixture_book(params, &["0.10"]);
    let summary = book.sheets.last().unwrap();
    assert_eq!(summary.rows[1][1], Cell::Int(2));
    assert_eq!(summary.rows[3][1], Cell::Int(5));
    assert_eq!(summary.rows[4][1], Cell::Int(100));
    assert_eq!(summary.rows[5][1], Cell::Int(80));
    assert_eq!(summary.rows[6][1], Cell::Int(20));
}

#[test]
fn rate_without_aggregate_yields_empty_sheet() {
    // a failed point leaves no aggregate behind; its sheet must hold no
    // data rows, no average formula and no dangling cross-reference
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();

    let params = SystemParams {
        x_size: 2,
        y_size: 2,
        packet_qty: 5,
        period_size: 100,
    };
    let rates = vec![
        InjectionRate {
            label: "0.10".to_string(),
            value: 0.1,
        },
        InjectionRate {
            label: "0.20".to_string(),
            value: 0.2,
        },
    ];
    // only the first rate collected anything
    let mut content = String::new();
    for i in 0..params.expected_records() {
        content.push_str(&format!("{},acc,{},{},0,0\n", i, i, i + 10));
    }
    std::fs::write(collector.aggregate_path(&rates[0]), content).unwrap();

    let weights = WeightPair {
        accurate: 80,
        approximate: 20,
    };
    let builder = ReportBuilder::new(&params, &rates);
    let book = builder.build(&weights, &collector).unwrap();

    assert_eq!(book.sheets.len(), 3);
    let failed_sheet = &book.sheets[1];
    assert_eq!(failed_sheet.rows.len(), 1); // header only
    let summary = book.sheets.last().unwrap();
    assert_eq!(
        summary.rows[9][1],
        Cell::Formula("='IR = 0.10'!G22".to_string())
    );
    assert_eq!(summary.rows[10][1], Cell::Text(String::new()));
}

#[test]
fn workbook_file_name_derives_from_weights() {
    let weights = WeightPair {
        accurate: 65,
        approximate: 35,
    };
    assert_eq!(
        ReportBuilder::file_name(&weights),
        "results_mixed_weighted_acc65_apx35.xlsx"
    );
}

#[test]
fn xlsx_render_smoke() {
    let params = SystemParams {
        x_size: 2,
        y_size: 2,
        packet_qty: 5,
        period_size: 100,
    };
    let (book, _, dir) = fixture_book(params, &["0.10", "0.20"]);
    let out = dir.path().join("out.xlsx");
    write_xlsx(&book, &out).unwrap();
    assert!(out.metadata().unwrap().len() > 0);
}
