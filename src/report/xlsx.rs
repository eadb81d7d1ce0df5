//! Workbook layout: styled header, bordered cells, gradient fills and links.

use rust_xlsxwriter::{
    Color, ColNum, ConditionalFormat3ColorScale, ConditionalFormatType, Format, FormatAlign,
    FormatBorder, FormatUnderline, RowNum, Url as XlsxUrl, Workbook, Worksheet, XlsxError,
};

use super::color::{ColorScale, CORAL_RED, MINT_GREEN};
use super::{Column, COLUMNS};
use crate::metrics::Elapsed;
use crate::models::ThreadRecord;

const SHEET_NAME: &str = "Thread Report";
const FONT: &str = "Microsoft YaHei";
const ROW_HEIGHT: f64 = 30.0;

const HEADER_FILL: u32 = 0x4F81BD;
const LINK_COLOR: u32 = 0x0563C1;
const VIEWS_LOW: u32 = 0xFFF8E1;
const VIEWS_MID: u32 = 0xFFB74D;
const VIEWS_HIGH: u32 = 0x81C784;

struct Styles {
    header: Format,
    cell: Format,
    decimal: Format,
    link: Format,
}

impl Styles {
    fn new() -> Self {
        let base = Format::new()
            .set_font_name(FONT)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin);

        Self {
            header: base
                .clone()
                .set_font_size(12)
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(HEADER_FILL)),
            cell: base.clone().set_font_size(11),
            decimal: base.clone().set_font_size(11).set_num_format("0.00"),
            link: base
                .set_font_size(11)
                .set_font_color(Color::RGB(LINK_COLOR))
                .set_underline(FormatUnderline::Single),
        }
    }
}

/// Lay out already sorted records into a single-sheet workbook.
///
/// # Errors
///
/// Returns an error if the xlsx writer rejects a cell or range.
pub fn build_workbook(records: &[ThreadRecord]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let styles = Styles::new();

    write_header(worksheet, &styles)?;

    let published = ColorScale::fit(
        records.iter().map(|r| r.metrics.published_elapsed_days),
        MINT_GREEN,
        CORAL_RED,
    );
    let last_reply = ColorScale::fit(
        records.iter().map(|r| r.metrics.last_reply_elapsed_hours),
        MINT_GREEN,
        CORAL_RED,
    );

    for (index, record) in records.iter().enumerate() {
        let row = (index + 1) as RowNum;
        worksheet.set_row_height(row, ROW_HEIGHT)?;
        write_record(worksheet, row, record, &styles, published, last_reply)?;
    }

    let last_row = records.len() as RowNum;
    if last_row > 0 {
        let views_scale = ConditionalFormat3ColorScale::new()
            .set_minimum_color(Color::RGB(VIEWS_LOW))
            .set_midpoint(ConditionalFormatType::Percentile, 50)
            .set_midpoint_color(Color::RGB(VIEWS_MID))
            .set_maximum_color(Color::RGB(VIEWS_HIGH));
        worksheet.add_conditional_format(
            1,
            Column::Views.index(),
            last_row,
            Column::DailyViews.index(),
            &views_scale,
        )?;
    }

    for column in COLUMNS {
        if column.is_helper() {
            worksheet.set_column_hidden(column.index())?;
        } else {
            worksheet.set_column_width(column.index(), column.width())?;
        }
    }

    let last_visible = COLUMNS
        .iter()
        .filter(|c| !c.is_helper())
        .map(|c| c.index())
        .max()
        .unwrap_or(0);
    worksheet.autofilter(0, 0, last_row, last_visible)?;

    Ok(workbook)
}

fn write_header(worksheet: &mut Worksheet, styles: &Styles) -> Result<(), XlsxError> {
    worksheet.set_row_height(0, ROW_HEIGHT)?;
    for column in COLUMNS {
        worksheet.write_string_with_format(0, column.index(), column.header(), &styles.header)?;
    }
    Ok(())
}

fn write_record(
    worksheet: &mut Worksheet,
    row: RowNum,
    record: &ThreadRecord,
    styles: &Styles,
    published: Option<ColorScale>,
    last_reply: Option<ColorScale>,
) -> Result<(), XlsxError> {
    let metrics = &record.metrics;

    worksheet.write_string_with_format(row, Column::Title.index(), &record.title, &styles.cell)?;
    worksheet.write_number_with_format(
        row,
        Column::Views.index(),
        record.views as f64,
        &styles.cell,
    )?;
    worksheet.write_number_with_format(
        row,
        Column::DailyViews.index(),
        metrics.daily_views,
        &styles.decimal,
    )?;
    worksheet.write_string_with_format(
        row,
        Column::Published.index(),
        &record.creation_date_raw,
        &styles.cell,
    )?;
    write_graded(
        worksheet,
        row,
        Column::SincePublished.index(),
        &metrics.published_elapsed_label,
        metrics.published_elapsed_days,
        published,
        &styles.cell,
    )?;
    worksheet.write_string_with_format(
        row,
        Column::LastReply.index(),
        &record.last_reply_date_raw,
        &styles.cell,
    )?;
    write_graded(
        worksheet,
        row,
        Column::SinceLastReply.index(),
        &metrics.last_reply_elapsed_label,
        metrics.last_reply_elapsed_hours,
        last_reply,
        &styles.cell,
    )?;

    if record.url.starts_with("http") {
        worksheet.write_url_with_format(
            row,
            Column::Url.index(),
            XlsxUrl::new(record.url.as_str()),
            &styles.link,
        )?;
    } else {
        worksheet.write_string_with_format(row, Column::Url.index(), &record.url, &styles.cell)?;
    }

    write_helper(
        worksheet,
        row,
        Column::PublishedDays.index(),
        metrics.published_elapsed_days,
        styles,
    )?;
    write_helper(
        worksheet,
        row,
        Column::LastReplyHours.index(),
        metrics.last_reply_elapsed_hours,
        styles,
    )?;
    Ok(())
}

/// Write an elapsed label, filled by its helper value when that is finite.
fn write_graded(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    label: &str,
    value: Elapsed,
    scale: Option<ColorScale>,
    format: &Format,
) -> Result<(), XlsxError> {
    match scale.and_then(|s| s.color_for(value)) {
        Some(fill) => {
            let filled = format.clone().set_background_color(Color::RGB(fill.to_u32()));
            worksheet.write_string_with_format(row, col, label, &filled)?;
        }
        None => {
            worksheet.write_string_with_format(row, col, label, format)?;
        }
    }
    Ok(())
}

fn write_helper(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    value: Elapsed,
    styles: &Styles,
) -> Result<(), XlsxError> {
    match value.finite() {
        Some(v) => {
            worksheet.write_number_with_format(row, col, v, &styles.decimal)?;
        }
        None => {
            worksheet.write_blank(row, col, &styles.cell)?;
        }
    }
    Ok(())
}
