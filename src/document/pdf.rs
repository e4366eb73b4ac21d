use printpdf::{BuiltinFont, Mm, PdfDocument};
use warp::http::header;

use crate::constants::{
    DOC_FIRST_LINE_Y_PT, DOC_LINE_HEIGHT_PT, DOC_MARGIN_X_PT, DOC_MIN_Y_PT, DOC_PAGE_HEIGHT_MM,
    DOC_PAGE_WIDTH_MM, DOC_TEXT_SIZE, DOC_TITLE_SIZE, DOC_TITLE_Y_PT, SHOPLIST_FILENAME,
    SHOPLIST_TITLE,
};
use crate::error::Error;
use crate::schema::ShoplistItem;

struct Line {
    y: f32,
    text: String,
}

fn pt_to_mm(value: f32) -> Mm {
    Mm(value * 25.4 / 72.0)
}

/// Flows the numbered items down the page: the cursor starts near the top,
/// drops a fixed step per line and wraps to a fresh page when it would fall
/// under the bottom margin. Numbering continues across the break.
fn layout(items: &[ShoplistItem]) -> Vec<Vec<Line>> {
    let mut pages: Vec<Vec<Line>> = vec![];
    let mut current: Vec<Line> = vec![];
    let mut y = DOC_FIRST_LINE_Y_PT;

    for (index, item) in items.iter().enumerate() {
        if y < DOC_MIN_Y_PT {
            pages.push(std::mem::take(&mut current));
            y = DOC_FIRST_LINE_Y_PT;
        }
        current.push(Line {
            y,
            text: format!(
                "{}: {} - {} {}",
                index + 1,
                item.name,
                item.total_amount,
                item.measurement_unit
            ),
        });
        y -= DOC_LINE_HEIGHT_PT;
    }

    pages.push(current);
    pages
}

/// Renders the aggregated shopping list as an A4 document. The title sits
/// on the first page only; an empty list still produces a valid one-page
/// document.
pub fn render_shopping_list(items: &[ShoplistItem]) -> Result<Vec<u8>, Error> {
    let pages = layout(items);

    let (document, first_page, first_layer) = PdfDocument::new(
        "Shopping list",
        Mm(DOC_PAGE_WIDTH_MM),
        Mm(DOC_PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let font = document
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| Error::Document(e.to_string()))?;

    let mut layer = document.get_page(first_page).get_layer(first_layer);
    layer.use_text(
        SHOPLIST_TITLE,
        DOC_TITLE_SIZE,
        pt_to_mm(DOC_MARGIN_X_PT),
        pt_to_mm(DOC_TITLE_Y_PT),
        &font,
    );

    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            let (page_index, layer_index) =
                document.add_page(Mm(DOC_PAGE_WIDTH_MM), Mm(DOC_PAGE_HEIGHT_MM), "Layer 1");
            layer = document.get_page(page_index).get_layer(layer_index);
        }
        for line in page {
            layer.use_text(
                line.text.clone(),
                DOC_TEXT_SIZE,
                pt_to_mm(DOC_MARGIN_X_PT),
                pt_to_mm(line.y),
                &font,
            );
        }
    }

    document
        .save_to_bytes()
        .map_err(|e| Error::Document(e.to_string()))
}

/// Wraps the rendered bytes so the client downloads the file instead of
/// displaying it inline.
pub fn as_attachment(document: Vec<u8>) -> Result<warp::reply::Response, Error> {
    warp::http::Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{SHOPLIST_FILENAME}\""),
        )
        .body(warp::hyper::Body::from(document))
        .map_err(|e| Error::Document(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(count: usize) -> Vec<ShoplistItem> {
        (0..count)
            .map(|index| ShoplistItem {
                name: format!("Item {index}"),
                measurement_unit: "g".into(),
                total_amount: (index as i64 + 1) * 10,
            })
            .collect()
    }

    #[test]
    fn lines_follow_the_expected_format() {
        let pages = layout(&[ShoplistItem {
            name: "Sugar".into(),
            measurement_unit: "g".into(),
            total_amount: 150,
        }]);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0][0].text, "1: Sugar - 150 g");
        assert_eq!(pages[0][0].y, DOC_FIRST_LINE_Y_PT);
    }

    #[test]
    fn forty_items_fill_exactly_two_pages() {
        let pages = layout(&items(40));
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 22);
        assert_eq!(pages[1].len(), 18);
    }

    #[test]
    fn numbering_continues_across_the_page_break() {
        let pages = layout(&items(40));
        assert!(pages[1][0].text.starts_with("23: "));
        assert_eq!(pages[1][0].y, DOC_FIRST_LINE_Y_PT);
        assert!(pages[1].last().unwrap().text.starts_with("40: "));
    }

    #[test]
    fn empty_list_is_a_single_empty_page() {
        let pages = layout(&[]);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn rendering_produces_a_pdf_even_with_no_items() {
        let bytes = render_shopping_list(&[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let bytes = render_shopping_list(&items(40)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn attachment_headers_force_a_download() {
        let response = as_attachment(vec![1, 2, 3]).unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("shopping_list.pdf"));
    }
}
