use calamine::{open_workbook_auto, Data, Reader};
use po_automation_lib::commands::{fill_order_form, OrderFormRequest};
use po_automation_lib::error::{AppError, SheetError};
use po_automation_lib::services::{reconcile_order_form, OrderFormJob};
use po_automation_lib::sheet_source::read_label_sheet;
use po_automation_lib::types::{LabelQuantityEntry, Quantity};
use po_automation_lib::Capability;
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::Path;

/// Order form with the anchors at fixed places (0-based for rust_xlsxwriter):
/// PO NUMBER: at B2, Order Date at C3, Main Labels in row 5, headers in row 6.
fn write_form(path: &Path, with_main_labels: bool) {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    ws.write_string(0, 0, "ORDER FORM").unwrap();
    ws.write_string(1, 0, "PO NUMBER: (required)").unwrap();
    ws.write_string(1, 1, "PO NUMBER:").unwrap();
    ws.write_string(2, 0, "Order Date : (dd/mm/yyyy)").unwrap();
    ws.write_string(2, 2, "Order Date : ").unwrap();
    if with_main_labels {
        ws.write_string(4, 0, "Main Labels").unwrap();
    }
    for (col, header) in ["#", "Item#", "Desc", "Quantity", "Unit"].iter().enumerate() {
        ws.write_string(5, col as u16, *header).unwrap();
    }
    workbook.save(path).unwrap();
}

fn write_po_export(path: &Path) {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    for (col, header) in ["Po No", "Item Name", "Order Qty"].iter().enumerate() {
        ws.write_string(0, col as u16, *header).unwrap();
    }
    ws.write_number(1, 0, 4500123456.0).unwrap();
    ws.write_string(1, 1, "Box LABEL A-12").unwrap();
    ws.write_number(1, 2, 40.0).unwrap();
    ws.write_string(2, 1, "Hang tag").unwrap();
    ws.write_number(2, 2, 5.0).unwrap();
    ws.write_string(3, 1, "Sticker LABEL B7").unwrap();
    ws.write_string(3, 2, "12 pcs").unwrap();
    workbook.save(path).unwrap();
}

fn entries() -> Vec<LabelQuantityEntry> {
    vec![
        LabelQuantityEntry {
            label: "A-12".into(),
            quantity: Quantity::Number(40.0),
        },
        LabelQuantityEntry {
            label: "B7".into(),
            quantity: Quantity::Text("12 pcs".into()),
        },
    ]
}

/// Cell at 1-based (row, col) of the first sheet.
fn cell(path: &Path, row: u32, col: u32) -> Data {
    let mut workbook = open_workbook_auto(path).unwrap();
    let name = workbook.sheet_names()[0].clone();
    let range = workbook.worksheet_range(&name).unwrap();
    range
        .get_value((row - 1, col - 1))
        .cloned()
        .unwrap_or(Data::Empty)
}

fn text(s: &str) -> Data {
    Data::String(s.to_string())
}

#[test]
fn fills_labels_and_scalars() {
    let dir = tempfile::tempdir().unwrap();
    let form = dir.path().join("form.xlsx");
    let output = dir.path().join("filled.xlsx");
    write_form(&form, true);
    let entries = entries();

    let outcome = reconcile_order_form(
        &Capability::offline(),
        &OrderFormJob {
            form_path: &form,
            output_path: &output,
            entries: &entries,
            po_number: "4500123456",
            order_date: "05/09/2024",
        },
    )
    .unwrap();

    assert_eq!(outcome.section.header_row, 6);
    assert_eq!(outcome.cells_written, 6);
    assert_eq!(outcome.order_date, "05-Sep-2024");
    assert_eq!(cell(&output, 7, 3), text("A-12"));
    assert_eq!(cell(&output, 7, 5), Data::Float(40.0));
    assert_eq!(cell(&output, 8, 3), text("B7"));
    assert_eq!(cell(&output, 8, 5), text("12 pcs"));
    assert_eq!(cell(&output, 2, 3), text("4500123456"));
    assert_eq!(cell(&output, 3, 4), text("05-Sep-2024"));
    assert!(!output.with_extension("tmp.xlsx").exists());
}

#[test]
fn filling_twice_gives_identical_cells() {
    let dir = tempfile::tempdir().unwrap();
    let form = dir.path().join("form.xlsx");
    write_form(&form, true);
    let entries = entries();

    let run = |output: &Path| {
        reconcile_order_form(
            &Capability::offline(),
            &OrderFormJob {
                form_path: &form,
                output_path: output,
                entries: &entries,
                po_number: "77",
                order_date: "01/01/2024",
            },
        )
        .unwrap();
    };
    let first = dir.path().join("first.xlsx");
    let second = dir.path().join("second.xlsx");
    run(&first);
    run(&second);
    // Re-running over a filled form changes nothing either.
    let refilled = dir.path().join("refilled.xlsx");
    reconcile_order_form(
        &Capability::offline(),
        &OrderFormJob {
            form_path: &first,
            output_path: &refilled,
            entries: &entries,
            po_number: "77",
            order_date: "01/01/2024",
        },
    )
    .unwrap();

    for row in 1..=8 {
        for col in 1..=5 {
            assert_eq!(cell(&first, row, col), cell(&second, row, col), "R{}C{}", row, col);
            assert_eq!(cell(&first, row, col), cell(&refilled, row, col), "R{}C{}", row, col);
        }
    }
}

#[test]
fn missing_section_leaves_destination_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let form = dir.path().join("form.xlsx");
    let output = dir.path().join("filled.xlsx");
    write_form(&form, false);
    fs::write(&output, b"previous contents").unwrap();

    let err = reconcile_order_form(
        &Capability::offline(),
        &OrderFormJob {
            form_path: &form,
            output_path: &output,
            entries: &entries(),
            po_number: "1",
            order_date: "01/01/2024",
        },
    )
    .unwrap_err();

    assert!(matches!(err, SheetError::SectionNotFound(_)));
    assert_eq!(fs::read(&output).unwrap(), b"previous contents");
    assert!(!output.with_extension("tmp.xlsx").exists());
}

#[test]
fn bad_order_date_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let form = dir.path().join("form.xlsx");
    let output = dir.path().join("filled.xlsx");
    write_form(&form, true);

    let err = reconcile_order_form(
        &Capability::offline(),
        &OrderFormJob {
            form_path: &form,
            output_path: &output,
            entries: &entries(),
            po_number: "1",
            order_date: "2024-01-01",
        },
    )
    .unwrap_err();

    assert!(matches!(err, SheetError::FormatMismatch(_)));
    assert!(!output.exists());
}

#[test]
fn po_export_drives_the_order_form() {
    let dir = tempfile::tempdir().unwrap();
    let po_sheet = dir.path().join("po_export.xlsx");
    let form = dir.path().join("form.xlsx");
    let output = dir.path().join("filled.xlsx");
    write_po_export(&po_sheet);
    write_form(&form, true);

    let sheet = read_label_sheet(&po_sheet).unwrap();
    assert_eq!(sheet.po_number, "4500123456");
    assert_eq!(sheet.entries, entries());

    let report = fill_order_form(
        &Capability::offline(),
        &OrderFormRequest {
            po_sheet,
            order_form: form.clone(),
            output: Some(output.clone()),
            in_place: false,
            order_date: Some("05/09/2024".into()),
        },
    )
    .unwrap();

    assert_eq!(report.outcome.output_path, output);
    assert_eq!(cell(&output, 7, 3), text("A-12"));
    assert_eq!(cell(&output, 2, 3), text("4500123456"));
    // The original form is not modified.
    assert_eq!(cell(&form, 7, 3), Data::Empty);
}

#[test]
fn in_place_overwrites_the_form() {
    let dir = tempfile::tempdir().unwrap();
    let po_sheet = dir.path().join("po_export.xlsx");
    let form = dir.path().join("form.xlsx");
    write_po_export(&po_sheet);
    write_form(&form, true);

    let report = fill_order_form(
        &Capability::offline(),
        &OrderFormRequest {
            po_sheet,
            order_form: form.clone(),
            output: None,
            in_place: true,
            order_date: Some("05/09/2024".into()),
        },
    )
    .unwrap();

    assert_eq!(report.outcome.output_path, form);
    assert_eq!(cell(&form, 8, 3), text("B7"));
}

#[test]
fn missing_po_sheet_is_a_sheet_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = fill_order_form(
        &Capability::offline(),
        &OrderFormRequest {
            po_sheet: dir.path().join("missing.xlsx"),
            order_form: dir.path().join("form.xlsx"),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(AppError::Sheet(SheetError::Io(_)))));
}
