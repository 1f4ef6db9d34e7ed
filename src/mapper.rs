//! Schema mapper: turns the lexer's generic [`TagNode`] tree into a typed
//! [`Email`] document.
//!
//! The mapper is deliberately permissive about attribute *values* (markup
//! frequently comes from a language model) and strict about *structure*:
//! coercion failures fall back to defaults with the original value kept in
//! the node's passthrough bag, while structural problems the grid cannot
//! absorb surface as errors naming the offending row.

use std::collections::BTreeMap;

use crate::blocks::{
    Block, Button, CartItem, Divider, Heading, Image, Link, List, ListKind, RawBlock, SocialLink,
    Socials, Spacer, Survey, SurveyChoice, SurveyKind, Table, Text,
};
use crate::document::{Column, Email, Row, RowKind, StyleVariant};
use crate::error::{EsmlError, EsmlResult};
use crate::lexer::TagNode;
use crate::style::{
    parse_alignment, parse_bool, parse_border_style, parse_heading_level,
    parse_vertical_alignment, px, Padding,
};

/// Convert a parsed tag tree into an `Email` document.
///
/// The root may be `EMAIL`, a bare `ROW`, or a bare block tag; assistant
/// output is frequently a fragment, and wrapping it beats refusing it.
/// Anything else is an [`EsmlError::UnknownTag`].
pub fn to_document(tag: &TagNode) -> EsmlResult<Email> {
    let mut ids = IdGen::default();
    match tag.name.as_str() {
        "EMAIL" => map_email(tag, &mut ids),
        "ROW" => {
            let mut email = Email::default();
            email.rows.push(map_row(tag, &mut ids)?);
            Ok(email)
        }
        name if is_block_tag(name) => {
            let mut email = Email::default();
            let mut row = Row::new(ids.next_row());
            let mut column = Column::new(ids.next_column(), 12);
            column.blocks.push(map_block(tag, &mut ids)?);
            row.columns.push(column);
            email.rows.push(row);
            Ok(email)
        }
        other => Err(EsmlError::UnknownTag {
            tag: other.to_string(),
            reason: "expected EMAIL, ROW, or a block tag at the document root".to_string(),
        }),
    }
}

fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "HEADING"
            | "TEXT"
            | "BUTTON"
            | "IMAGE"
            | "DIVIDER"
            | "SPACER"
            | "LINK"
            | "LIST"
            | "TABLE"
            | "SOCIALS"
            | "CART_ITEM"
            | "SURVEY"
    )
}

/// Deterministic id source. Explicit `id` attributes always win; generated
/// ids are sequential per document so parsing is reproducible.
#[derive(Default)]
struct IdGen {
    row: usize,
    column: usize,
    block: usize,
}

impl IdGen {
    fn next_row(&mut self) -> String {
        self.row += 1;
        format!("r{}", self.row)
    }

    fn next_column(&mut self) -> String {
        self.column += 1;
        format!("c{}", self.column)
    }

    fn next_block(&mut self) -> String {
        self.block += 1;
        format!("b{}", self.block)
    }

    fn row_id(&mut self, tag: &TagNode) -> String {
        tag.attr("id").map(str::to_string).unwrap_or_else(|| self.next_row())
    }

    fn column_id(&mut self, tag: &TagNode) -> String {
        tag.attr("id").map(str::to_string).unwrap_or_else(|| self.next_column())
    }

    fn block_id(&mut self, tag: &TagNode) -> String {
        tag.attr("id").map(str::to_string).unwrap_or_else(|| self.next_block())
    }
}

// ─── Email ───────────────────────────────────────────────────────────────────

fn map_email(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Email> {
    let mut email = Email::default();

    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" => email.id = value.clone(),
            "name" => email.name = Some(value.clone()),
            "preview" => email.preview = Some(value.clone()),
            "fontFamily" => email.font_family = value.clone(),
            "width" => email.width = value.clone(),
            "color" => email.color = value.clone(),
            "bgColor" | "backgroundColor" => email.background_color = value.clone(),
            "backgroundImage" | "bgImage" => email.background_image = Some(value.clone()),
            "backgroundPosition" => email.background_position = Some(value.clone()),
            "backgroundSize" => email.background_size = Some(value.clone()),
            "backgroundRepeat" => email.background_repeat = Some(value.clone()),
            "styleVariant" => match StyleVariant::parse(value) {
                Some(v) => email.style_variant = v,
                None => {
                    email.extra.insert(key.clone(), value.clone());
                }
            },
            _ => {
                email.extra.insert(key.clone(), value.clone());
            }
        }
    }

    // Rows; bare block tags directly under EMAIL fold into implicit rows.
    let mut pending: Vec<Block> = Vec::new();
    for child in &tag.children {
        if child.name == "ROW" {
            flush_implicit_row(&mut email.rows, &mut pending, ids);
            email.rows.push(map_row(child, ids)?);
        } else {
            pending.push(map_block(child, ids)?);
        }
    }
    flush_implicit_row(&mut email.rows, &mut pending, ids);

    Ok(email)
}

fn flush_implicit_row(rows: &mut Vec<Row>, pending: &mut Vec<Block>, ids: &mut IdGen) {
    if pending.is_empty() {
        return;
    }
    let mut row = Row::new(ids.next_row());
    let mut column = Column::new(ids.next_column(), 12);
    column.blocks = std::mem::take(pending);
    row.columns.push(column);
    rows.push(row);
}

// ─── Rows & columns ──────────────────────────────────────────────────────────

fn map_row(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Row> {
    let mut row = Row::new(ids.row_id(tag));

    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" => {}
            "type" => match RowKind::parse(value) {
                Some(kind) => row.kind = kind,
                None => {
                    row.extra.insert(key.clone(), value.clone());
                }
            },
            "padding" => row.padding = Padding::from_shorthand(value),
            "paddingTop" => row.padding.top = Some(px(value)),
            "paddingRight" => row.padding.right = Some(px(value)),
            "paddingBottom" => row.padding.bottom = Some(px(value)),
            "paddingLeft" => row.padding.left = Some(px(value)),
            "bgColor" | "backgroundColor" => row.background_color = Some(value.clone()),
            "borderWidth" => row.border.width = Some(px(value)),
            "borderStyle" => match parse_border_style(value) {
                Some(style) => row.border.style = Some(style),
                None => {
                    row.extra.insert(key.clone(), value.clone());
                }
            },
            "borderColor" => row.border.color = Some(value.clone()),
            "borderRadius" => row.border.radius = Some(px(value)),
            "align" => match parse_alignment(value) {
                Some(align) => row.align = Some(align),
                None => {
                    row.extra.insert(key.clone(), value.clone());
                }
            },
            "stackOnMobile" => match parse_bool(value) {
                Some(b) => row.stack_on_mobile = Some(b),
                None => {
                    row.extra.insert(key.clone(), value.clone());
                }
            },
            "columnSpacing" => row.column_spacing = Some(px(value)),
            "maxWidth" => row.max_width = Some(px(value)),
            "containerAlign" => match parse_alignment(value) {
                Some(align) => row.container_align = Some(align),
                None => {
                    row.extra.insert(key.clone(), value.clone());
                }
            },
            _ => {
                row.extra.insert(key.clone(), value.clone());
            }
        }
    }

    // Explicit columns, with every contiguous run of bare block tags folded
    // into one synthesized column. Most hand-authored single-column rows
    // carry no COLUMN tag at all, so this path is load-bearing.
    let mut pending: Vec<Block> = Vec::new();
    for child in &tag.children {
        if child.name == "COLUMN" {
            flush_implicit_column(&mut row.columns, &mut pending, ids);
            row.columns.push(map_column(child, ids)?);
        } else {
            pending.push(map_block(child, ids)?);
        }
    }
    flush_implicit_column(&mut row.columns, &mut pending, ids);

    normalize_spans(&mut row)?;
    Ok(row)
}

fn flush_implicit_column(columns: &mut Vec<Column>, pending: &mut Vec<Block>, ids: &mut IdGen) {
    if pending.is_empty() {
        return;
    }
    // Span 0 marks "unassigned"; normalize_spans distributes the remainder.
    let mut column = Column::new(ids.next_column(), 0);
    column.blocks = std::mem::take(pending);
    columns.push(column);
}

fn map_column(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Column> {
    let mut column = Column::new(ids.column_id(tag), 0);

    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" => {}
            "width" | "span" => match parse_span(value) {
                Some(span) => column.span = span,
                None => {
                    column.extra.insert("width".to_string(), value.clone());
                }
            },
            "padding" => column.padding = Padding::from_shorthand(value),
            "paddingTop" => column.padding.top = Some(px(value)),
            "paddingRight" => column.padding.right = Some(px(value)),
            "paddingBottom" => column.padding.bottom = Some(px(value)),
            "paddingLeft" => column.padding.left = Some(px(value)),
            "align" => match parse_alignment(value) {
                Some(align) => column.align = Some(align),
                None => {
                    column.extra.insert(key.clone(), value.clone());
                }
            },
            "verticalAlign" | "valign" => match parse_vertical_alignment(value) {
                Some(valign) => column.vertical_align = Some(valign),
                None => {
                    column.extra.insert(key.clone(), value.clone());
                }
            },
            "borderWidth" => column.border.width = Some(px(value)),
            "borderStyle" => match parse_border_style(value) {
                Some(style) => column.border.style = Some(style),
                None => {
                    column.extra.insert(key.clone(), value.clone());
                }
            },
            "borderColor" => column.border.color = Some(value.clone()),
            "borderRadius" => column.border.radius = Some(px(value)),
            _ => {
                column.extra.insert(key.clone(), value.clone());
            }
        }
    }

    for child in &tag.children {
        column.blocks.push(map_block(child, ids)?);
    }
    // Stray text directly in a column becomes a text block rather than
    // silently vanishing.
    if column.blocks.is_empty() {
        if let Some(text) = &tag.text {
            column.blocks.push(Block::Text(Text {
                id: ids.next_block(),
                content: text.clone(),
                color: None,
                font_size: None,
                font_weight: None,
                text_align: None,
                line_height: None,
                padding: Padding::default(),
                extra: BTreeMap::new(),
            }));
        }
    }

    Ok(column)
}

/// A grid share (`1`-`12`) or a percentage (`50%` → 6).
fn parse_span(value: &str) -> Option<u8> {
    let value = value.trim();
    if let Some(percent) = value.strip_suffix('%') {
        let p: f64 = percent.trim().parse().ok()?;
        let span = (p * 12.0 / 100.0).round() as i64;
        return Some(span.clamp(1, 12) as u8);
    }
    match value.parse::<u8>() {
        Ok(n) if (1..=12).contains(&n) => Some(n),
        _ => None,
    }
}

/// Make the row's spans sum to 12.
///
/// Unassigned columns split the remaining shares evenly with the last one
/// absorbing the remainder. Explicit spans that miss 12 are corrected by
/// adjusting the final column when that keeps it within 1-12; otherwise the
/// row is rejected.
fn normalize_spans(row: &mut Row) -> EsmlResult<()> {
    if row.columns.is_empty() {
        return Ok(());
    }

    let explicit: u32 = row.columns.iter().map(|c| c.span as u32).sum();
    let unassigned = row.columns.iter().filter(|c| c.span == 0).count() as u32;

    if unassigned > 0 {
        let remaining = 12i32 - explicit as i32;
        if remaining < unassigned as i32 {
            return Err(EsmlError::GridSum {
                row_id: row.id.clone(),
                sum: explicit + unassigned,
            });
        }
        let share = (remaining as u32) / unassigned;
        let mut assigned = 0u32;
        let mut seen = 0u32;
        for column in row.columns.iter_mut().filter(|c| c.span == 0) {
            seen += 1;
            let span = if seen == unassigned {
                remaining as u32 - assigned
            } else {
                share
            };
            column.span = span as u8;
            assigned += span;
        }
    }

    let sum: u32 = row.columns.iter().map(|c| c.span as u32).sum();
    if sum != 12 {
        let diff = 12i32 - sum as i32;
        let last = row.columns.last_mut().unwrap();
        let corrected = last.span as i32 + diff;
        if (1..=12).contains(&corrected) {
            last.span = corrected as u8;
        } else {
            return Err(EsmlError::GridSum {
                row_id: row.id.clone(),
                sum,
            });
        }
    }
    Ok(())
}

// ─── Blocks ──────────────────────────────────────────────────────────────────

fn map_block(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Block> {
    match tag.name.as_str() {
        "HEADING" => map_heading(tag, ids).map(Block::Heading),
        "TEXT" => map_text(tag, ids).map(Block::Text),
        "BUTTON" => map_button(tag, ids).map(Block::Button),
        "IMAGE" => map_image(tag, ids).map(Block::Image),
        "DIVIDER" => map_divider(tag, ids).map(Block::Divider),
        "SPACER" => map_spacer(tag, ids).map(Block::Spacer),
        "LINK" => map_link(tag, ids).map(Block::Link),
        "LIST" => map_list(tag, ids).map(Block::List),
        "TABLE" => map_table(tag, ids).map(Block::Table),
        "SOCIALS" => map_socials(tag, ids).map(Block::Socials),
        "CART_ITEM" => map_cart_item(tag, ids).map(Block::CartItem),
        "SURVEY" => map_survey(tag, ids).map(Block::Survey),
        _ => Ok(Block::Raw(map_raw(tag, ids))),
    }
}

/// Content comes from the `content` attribute or the tag body, attribute
/// winning, since the brace dialect has no body text for quoted content.
fn content_of(tag: &TagNode) -> String {
    tag.attr("content")
        .map(str::to_string)
        .or_else(|| tag.text.clone())
        .unwrap_or_default()
}

fn map_heading(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Heading> {
    let mut heading = Heading {
        id: ids.block_id(tag),
        content: content_of(tag),
        level: crate::style::HeadingLevel::H2,
        color: None,
        font_size: None,
        font_weight: None,
        text_align: None,
        line_height: None,
        padding: Padding::default(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" | "content" => {}
            "level" => match parse_heading_level(value) {
                Some(level) => heading.level = level,
                None => {
                    heading.extra.insert(key.clone(), value.clone());
                }
            },
            "color" => heading.color = Some(value.clone()),
            "fontSize" => heading.font_size = Some(px(value)),
            "fontWeight" => heading.font_weight = Some(value.clone()),
            "align" | "textAlign" => match parse_alignment(value) {
                Some(align) => heading.text_align = Some(align),
                None => {
                    heading.extra.insert(key.clone(), value.clone());
                }
            },
            "lineHeight" => heading.line_height = Some(value.clone()),
            "padding" => heading.padding = Padding::from_shorthand(value),
            "paddingTop" => heading.padding.top = Some(px(value)),
            "paddingRight" => heading.padding.right = Some(px(value)),
            "paddingBottom" => heading.padding.bottom = Some(px(value)),
            "paddingLeft" => heading.padding.left = Some(px(value)),
            _ => {
                heading.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(heading)
}

fn map_text(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Text> {
    let mut text = Text {
        id: ids.block_id(tag),
        content: content_of(tag),
        color: None,
        font_size: None,
        font_weight: None,
        text_align: None,
        line_height: None,
        padding: Padding::default(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" | "content" => {}
            "color" => text.color = Some(value.clone()),
            "fontSize" => text.font_size = Some(px(value)),
            "fontWeight" => text.font_weight = Some(value.clone()),
            "align" | "textAlign" => match parse_alignment(value) {
                Some(align) => text.text_align = Some(align),
                None => {
                    text.extra.insert(key.clone(), value.clone());
                }
            },
            "lineHeight" => text.line_height = Some(value.clone()),
            "padding" => text.padding = Padding::from_shorthand(value),
            "paddingTop" => text.padding.top = Some(px(value)),
            "paddingRight" => text.padding.right = Some(px(value)),
            "paddingBottom" => text.padding.bottom = Some(px(value)),
            "paddingLeft" => text.padding.left = Some(px(value)),
            _ => {
                text.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(text)
}

fn map_button(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Button> {
    let mut button = Button {
        id: ids.block_id(tag),
        content: content_of(tag),
        // "#" is a safe default; a button without a destination still
        // renders instead of sinking the whole document.
        href: tag.attr("href").unwrap_or("#").to_string(),
        background_color: None,
        color: None,
        font_size: None,
        align: None,
        border: Default::default(),
        padding: Padding::default(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" | "content" | "href" => {}
            "bgColor" | "backgroundColor" => button.background_color = Some(value.clone()),
            "color" => button.color = Some(value.clone()),
            "fontSize" => button.font_size = Some(px(value)),
            "align" => match parse_alignment(value) {
                Some(align) => button.align = Some(align),
                None => {
                    button.extra.insert(key.clone(), value.clone());
                }
            },
            "borderWidth" => button.border.width = Some(px(value)),
            "borderStyle" => match parse_border_style(value) {
                Some(style) => button.border.style = Some(style),
                None => {
                    button.extra.insert(key.clone(), value.clone());
                }
            },
            "borderColor" => button.border.color = Some(value.clone()),
            "borderRadius" => button.border.radius = Some(px(value)),
            "padding" => button.padding = Padding::from_shorthand(value),
            "paddingTop" => button.padding.top = Some(px(value)),
            "paddingRight" => button.padding.right = Some(px(value)),
            "paddingBottom" => button.padding.bottom = Some(px(value)),
            "paddingLeft" => button.padding.left = Some(px(value)),
            _ => {
                button.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(button)
}

fn map_image(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Image> {
    let src = tag
        .attr("src")
        .ok_or_else(|| EsmlError::MissingAttribute {
            tag: "IMAGE".to_string(),
            attribute: "src".to_string(),
        })?
        .to_string();
    let mut image = Image {
        id: ids.block_id(tag),
        src,
        alt: None,
        width: None,
        height: None,
        border_radius: None,
        align: None,
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" | "src" => {}
            "alt" => image.alt = Some(value.clone()),
            "width" => image.width = Some(px(value)),
            "height" => image.height = Some(px(value)),
            "borderRadius" => image.border_radius = Some(px(value)),
            "align" => match parse_alignment(value) {
                Some(align) => image.align = Some(align),
                None => {
                    image.extra.insert(key.clone(), value.clone());
                }
            },
            _ => {
                image.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(image)
}

fn map_divider(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Divider> {
    let mut divider = Divider {
        id: ids.block_id(tag),
        border_width: None,
        border_color: None,
        border_style: None,
        padding: Padding::default(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" => {}
            "borderWidth" | "width" => divider.border_width = Some(px(value)),
            "borderColor" | "color" => divider.border_color = Some(value.clone()),
            "borderStyle" => match parse_border_style(value) {
                Some(style) => divider.border_style = Some(style),
                None => {
                    divider.extra.insert(key.clone(), value.clone());
                }
            },
            "padding" => divider.padding = Padding::from_shorthand(value),
            "paddingTop" => divider.padding.top = Some(px(value)),
            "paddingRight" => divider.padding.right = Some(px(value)),
            "paddingBottom" => divider.padding.bottom = Some(px(value)),
            "paddingLeft" => divider.padding.left = Some(px(value)),
            _ => {
                divider.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(divider)
}

fn map_spacer(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Spacer> {
    let mut spacer = Spacer {
        id: ids.block_id(tag),
        height: "16px".to_string(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" => {}
            "height" | "size" => spacer.height = px(value),
            _ => {
                spacer.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(spacer)
}

fn map_link(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Link> {
    let mut link = Link {
        id: ids.block_id(tag),
        href: tag.attr("href").unwrap_or("#").to_string(),
        content: None,
        color: None,
        underline: None,
        children: Vec::new(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" | "href" => {}
            "content" => link.content = Some(value.clone()),
            "color" => link.color = Some(value.clone()),
            "underline" => match parse_bool(value) {
                Some(b) => link.underline = Some(b),
                None => {
                    link.extra.insert(key.clone(), value.clone());
                }
            },
            _ => {
                link.extra.insert(key.clone(), value.clone());
            }
        }
    }
    for child in &tag.children {
        link.children.push(map_block(child, ids)?);
    }
    if link.content.is_none() && link.children.is_empty() {
        link.content = tag.text.clone();
    }
    Ok(link)
}

fn map_list(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<List> {
    let mut list = List {
        id: ids.block_id(tag),
        kind: ListKind::Unordered,
        items: Vec::new(),
        color: None,
        font_size: None,
        padding: Padding::default(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" => {}
            "kind" | "type" => match value.trim().to_ascii_lowercase().as_str() {
                "ordered" | "ol" | "numbered" => list.kind = ListKind::Ordered,
                "unordered" | "ul" | "bullet" => list.kind = ListKind::Unordered,
                _ => {
                    list.extra.insert(key.clone(), value.clone());
                }
            },
            "items" => {
                // Comma list fallback for single-line authoring; ITEM
                // children take precedence below.
                list.items = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "color" => list.color = Some(value.clone()),
            "fontSize" => list.font_size = Some(px(value)),
            "padding" => list.padding = Padding::from_shorthand(value),
            "paddingTop" => list.padding.top = Some(px(value)),
            "paddingRight" => list.padding.right = Some(px(value)),
            "paddingBottom" => list.padding.bottom = Some(px(value)),
            "paddingLeft" => list.padding.left = Some(px(value)),
            _ => {
                list.extra.insert(key.clone(), value.clone());
            }
        }
    }
    let items: Vec<String> = tag
        .children
        .iter()
        .filter(|c| c.name == "ITEM")
        .map(|c| {
            c.attr("content")
                .map(str::to_string)
                .or_else(|| c.text.clone())
                .unwrap_or_default()
        })
        .collect();
    if !items.is_empty() {
        list.items = items;
    }
    Ok(list)
}

fn map_table(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Table> {
    let mut table = Table {
        id: ids.block_id(tag),
        has_header: false,
        rows: Vec::new(),
        border_color: None,
        padding: Padding::default(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" => {}
            "header" | "hasHeader" => match parse_bool(value) {
                Some(b) => table.has_header = b,
                None => {
                    table.extra.insert(key.clone(), value.clone());
                }
            },
            "borderColor" => table.border_color = Some(value.clone()),
            "padding" => table.padding = Padding::from_shorthand(value),
            _ => {
                table.extra.insert(key.clone(), value.clone());
            }
        }
    }
    for tr in tag.children.iter().filter(|c| c.name == "TR") {
        let cells: Vec<String> = tr
            .children
            .iter()
            .filter(|c| c.name == "CELL" || c.name == "TD")
            .map(|c| {
                c.attr("content")
                    .map(str::to_string)
                    .or_else(|| c.text.clone())
                    .unwrap_or_default()
            })
            .collect();
        table.rows.push(cells);
    }
    Ok(table)
}

fn map_socials(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Socials> {
    let mut socials = Socials {
        id: ids.block_id(tag),
        links: Vec::new(),
        align: None,
        icon_size: None,
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" => {}
            "links" | "socialLinks" => {
                for entry in parse_object_list(value) {
                    socials.links.push(SocialLink {
                        platform: entry.get("platform").cloned().unwrap_or_default(),
                        url: entry.get("url").cloned().unwrap_or_default(),
                        icon: entry.get("icon").cloned(),
                    });
                }
            }
            "align" => match parse_alignment(value) {
                Some(align) => socials.align = Some(align),
                None => {
                    socials.extra.insert(key.clone(), value.clone());
                }
            },
            "iconSize" => socials.icon_size = Some(px(value)),
            _ => {
                socials.extra.insert(key.clone(), value.clone());
            }
        }
    }
    for child in tag.children.iter().filter(|c| c.name == "SOCIAL") {
        socials.links.push(SocialLink {
            platform: child.attr("platform").unwrap_or_default().to_string(),
            url: child.attr("url").unwrap_or_default().to_string(),
            icon: child.attr("icon").map(str::to_string),
        });
    }
    Ok(socials)
}

fn map_cart_item(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<CartItem> {
    let mut item = CartItem {
        id: ids.block_id(tag),
        image: tag.attr("image").unwrap_or_default().to_string(),
        name: tag.attr("name").unwrap_or_default().to_string(),
        description: None,
        quantity: None,
        price: None,
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" | "image" | "name" => {}
            "description" => item.description = Some(value.clone()),
            "quantity" => item.quantity = Some(value.clone()),
            "price" => item.price = Some(value.clone()),
            _ => {
                item.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(item)
}

fn map_survey(tag: &TagNode, ids: &mut IdGen) -> EsmlResult<Survey> {
    let kind = match tag.attr("kind").map(|k| k.trim().to_ascii_lowercase()) {
        Some(k) if k == "rating" => SurveyKind::Rating,
        _ => SurveyKind::YesNo,
    };
    let mut survey = Survey {
        id: ids.block_id(tag),
        kind,
        question: tag
            .attr("question")
            .map(str::to_string)
            .or_else(|| tag.text.clone())
            .unwrap_or_default(),
        choices: Vec::new(),
        extra: BTreeMap::new(),
    };
    for (key, value) in &tag.attributes {
        match key.as_str() {
            "id" | "kind" | "question" => {}
            // Shorthand for the common yes/no case.
            "yesUrl" => survey.choices.push(SurveyChoice {
                label: "Yes".to_string(),
                url: value.clone(),
            }),
            "noUrl" => survey.choices.push(SurveyChoice {
                label: "No".to_string(),
                url: value.clone(),
            }),
            _ => {
                survey.extra.insert(key.clone(), value.clone());
            }
        }
    }
    for child in tag.children.iter().filter(|c| c.name == "CHOICE") {
        survey.choices.push(SurveyChoice {
            label: child.attr("label").unwrap_or_default().to_string(),
            url: child.attr("url").unwrap_or_default().to_string(),
        });
    }
    Ok(survey)
}

fn map_raw(tag: &TagNode, ids: &mut IdGen) -> RawBlock {
    let mut attributes = BTreeMap::new();
    for (key, value) in &tag.attributes {
        if key != "id" {
            attributes.insert(key.clone(), value.clone());
        }
    }
    RawBlock {
        id: ids.block_id(tag),
        name: tag.name.clone(),
        attributes,
        content: tag.text.clone(),
    }
}

// ─── Lenient object-list literals ────────────────────────────────────────────

/// Parse a JSON-like list of flat objects (`[{platform:instagram,url:...},
/// {...}]`) into key → value maps. Keys and values may be quoted or bare;
/// values keep everything up to the next top-level comma, so URLs with
/// colons survive. Malformed entries yield empty maps rather than errors;
/// the caller treats missing keys as absent.
fn parse_object_list(input: &str) -> Vec<BTreeMap<String, String>> {
    let mut objects = Vec::new();
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    for (i, c) in inner.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => {
                if depth == 0 {
                    start = Some(i + 1);
                }
                depth += 1;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(parse_object_body(&inner[s..i]));
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

fn parse_object_body(body: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for entry in split_top_level(body, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some(colon) = entry.find(':') {
            let key = unquote(entry[..colon].trim());
            let value = unquote(entry[colon + 1..].trim());
            if !key.is_empty() {
                map.insert(key, value);
            }
        }
    }
    map
}

fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + sep.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
        {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::parse_markup;

    fn doc(src: &str) -> Email {
        to_document(&parse_markup(src).unwrap()).unwrap()
    }

    #[test]
    fn implicit_column_for_bare_blocks() {
        let email = doc("<EMAIL><ROW><TEXT>a</TEXT><TEXT>b</TEXT><TEXT>c</TEXT></ROW></EMAIL>");
        let row = &email.rows[0];
        assert_eq!(row.columns.len(), 1);
        assert_eq!(row.columns[0].span, 12);
        assert_eq!(row.columns[0].blocks.len(), 3);
    }

    #[test]
    fn percent_widths_become_spans() {
        let email = doc("ROW { COLUMN width=50% { TEXT content=a } COLUMN width=50% { TEXT content=b } }");
        let row = &email.rows[0];
        assert_eq!(row.columns.len(), 2);
        assert_eq!(row.columns[0].span, 6);
        assert_eq!(row.columns[1].span, 6);
    }

    #[test]
    fn even_split_absorbs_remainder_in_last() {
        let email = doc(
            "<EMAIL><ROW><COLUMN><TEXT>1</TEXT></COLUMN><COLUMN><TEXT>2</TEXT></COLUMN>\
             <COLUMN><TEXT>3</TEXT></COLUMN><COLUMN><TEXT>4</TEXT></COLUMN>\
             <COLUMN><TEXT>5</TEXT></COLUMN></ROW></EMAIL>",
        );
        let spans: Vec<u8> = email.rows[0].columns.iter().map(|c| c.span).collect();
        assert_eq!(spans, vec![2, 2, 2, 2, 4]);
        assert_eq!(email.rows[0].span_sum(), 12);
    }

    #[test]
    fn explicit_spans_are_corrected_to_twelve() {
        let email = doc(
            "<EMAIL><ROW><COLUMN width=4><TEXT>a</TEXT></COLUMN>\
             <COLUMN width=4><TEXT>b</TEXT></COLUMN></ROW></EMAIL>",
        );
        let spans: Vec<u8> = email.rows[0].columns.iter().map(|c| c.span).collect();
        assert_eq!(spans, vec![4, 8]);
    }

    #[test]
    fn email_defaults_applied() {
        let email = doc("<EMAIL><ROW><TEXT>x</TEXT></ROW></EMAIL>");
        assert_eq!(email.width, "600");
        assert_eq!(email.color, "#000000");
        assert_eq!(email.style_variant, StyleVariant::Default);
    }

    #[test]
    fn unknown_attributes_are_preserved() {
        let email = doc("<EMAIL futureKnob=\"7\"><ROW mystery=yes><TEXT>x</TEXT></ROW></EMAIL>");
        assert_eq!(email.extra.get("futureKnob").map(String::as_str), Some("7"));
        assert_eq!(email.rows[0].extra.get("mystery").map(String::as_str), Some("yes"));
    }

    #[test]
    fn unknown_tag_becomes_raw_block() {
        let email = doc("<EMAIL><ROW><COUNTDOWN until=\"2026-01-01\"/></ROW></EMAIL>");
        match &email.rows[0].columns[0].blocks[0] {
            Block::Raw(raw) => {
                assert_eq!(raw.name, "COUNTDOWN");
                assert_eq!(raw.attributes.get("until").map(String::as_str), Some("2026-01-01"));
            }
            other => panic!("expected raw block, got {:?}", other),
        }
    }

    #[test]
    fn socials_inline_literal_and_children_agree() {
        let inline = doc(
            "<EMAIL><ROW><SOCIALS links=[{platform:instagram,url:https://ig.example.com},{platform:x,url:https://x.example.com}]/></ROW></EMAIL>",
        );
        let nested = doc(
            "<EMAIL><ROW><SOCIALS>\
             <SOCIAL platform=\"instagram\" url=\"https://ig.example.com\"/>\
             <SOCIAL platform=\"x\" url=\"https://x.example.com\"/>\
             </SOCIALS></ROW></EMAIL>",
        );
        let get = |email: &Email| match &email.rows[0].columns[0].blocks[0] {
            Block::Socials(s) => s.links.clone(),
            other => panic!("expected socials, got {:?}", other),
        };
        assert_eq!(get(&inline), get(&nested));
    }

    #[test]
    fn missing_image_src_is_an_error() {
        let tag = parse_markup("<EMAIL><ROW><IMAGE alt=\"x\"/></ROW></EMAIL>").unwrap();
        let err = to_document(&tag).unwrap_err();
        assert_eq!(
            err,
            EsmlError::MissingAttribute {
                tag: "IMAGE".to_string(),
                attribute: "src".to_string(),
            }
        );
    }

    #[test]
    fn overflow_within_reach_is_normalized() {
        let email = doc(
            "<EMAIL><ROW><COLUMN width=9><TEXT>a</TEXT></COLUMN>\
             <COLUMN width=9><TEXT>b</TEXT></COLUMN></ROW></EMAIL>",
        );
        let spans: Vec<u8> = email.rows[0].columns.iter().map(|c| c.span).collect();
        assert_eq!(spans, vec![9, 3]);
    }

    #[test]
    fn unfixable_spans_are_rejected() {
        let tag = parse_markup(
            "<EMAIL><ROW id=\"wide\"><COLUMN width=12><TEXT>a</TEXT></COLUMN>\
             <COLUMN width=12><TEXT>b</TEXT></COLUMN></ROW></EMAIL>",
        )
        .unwrap();
        let err = to_document(&tag).unwrap_err();
        assert!(matches!(err, EsmlError::GridSum { ref row_id, .. } if row_id == "wide"));
    }

    #[test]
    fn object_list_handles_quotes_and_urls() {
        let entries = parse_object_list(
            r#"[{platform:"instagram",url:https://example.com/a?b=c},{platform:x,url:'https://example.com/d'}]"#,
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].get("platform").map(String::as_str), Some("instagram"));
        assert_eq!(entries[0].get("url").map(String::as_str), Some("https://example.com/a?b=c"));
        assert_eq!(entries[1].get("url").map(String::as_str), Some("https://example.com/d"));
    }

    #[test]
    fn ids_are_deterministic() {
        let a = doc("<EMAIL><ROW><TEXT>x</TEXT></ROW></EMAIL>");
        let b = doc("<EMAIL><ROW><TEXT>x</TEXT></ROW></EMAIL>");
        assert_eq!(a, b);
        assert_eq!(a.rows[0].id, "r1");
        assert_eq!(a.rows[0].columns[0].id, "c1");
        assert_eq!(a.rows[0].columns[0].blocks[0].id(), "b1");
    }
}
