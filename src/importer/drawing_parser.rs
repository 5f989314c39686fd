// ==========================================
// 产品目录导入 - 表格归档绘图解析
// ==========================================
// 职责: 打开 xlsx 归档，定位第一个工作表的绘图部件，
//       读取图片锚点范围与 xl/media 下的光栅图片清单
// 范围: 其他工作表绘图引用的图片不计入清单
// 路径: workbook.xml → workbook rels → sheet rels → drawing + drawing rels
// ==========================================

use crate::importer::image_codec::is_raster_media;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// 内存中的 xlsx 归档
pub type SheetArchive<'a> = ZipArchive<Cursor<&'a [u8]>>;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const FALLBACK_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";
const FALLBACK_DRAWING_PATH: &str = "xl/drawings/drawing1.xml";
const MEDIA_PREFIX: &str = "xl/media/";
const DRAWING_RELS_PREFIX: &str = "xl/drawings/_rels/";

// ==========================================
// CellAnchor - 图片覆盖的单元格范围（0 基，含边界）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellAnchor {
    pub from_row: u32,
    pub from_col: u32,
    pub to_row: u32,
    pub to_col: u32,
    pub media_path: String,
}

impl CellAnchor {
    /// 是否覆盖目标单元格；col 为 None 时只比较行
    pub fn covers(&self, row: u32, col: Option<u32>) -> bool {
        let row_hit = self.from_row <= row && row <= self.to_row;
        let col_hit = col
            .map(|c| self.from_col <= c && c <= self.to_col)
            .unwrap_or(true);
        row_hit && col_hit
    }
}

// ==========================================
// SheetDrawing - 第一个工作表的图片信息
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetDrawing {
    /// 单元格锚点（文档顺序）
    pub anchors: Vec<CellAnchor>,
    /// 绝对定位图片（不绑定单元格）
    pub floating: Vec<String>,
    /// 光栅图片（归档顺序）
    pub media: Vec<String>,
}

impl SheetDrawing {
    /// 绘图部件是否给出了图片位置（含绝对定位）
    pub fn has_anchor_metadata(&self) -> bool {
        !self.anchors.is_empty() || !self.floating.is_empty()
    }

    /// 图片是否被某个锚点绑定
    pub fn is_anchored(&self, media_path: &str) -> bool {
        self.anchors.iter().any(|a| a.media_path == media_path)
    }

    /// 未被任何锚点绑定、也不是绝对定位的光栅图片
    pub fn orphan_media(&self) -> impl Iterator<Item = &str> {
        self.media
            .iter()
            .map(|m| m.as_str())
            .filter(move |m| !self.is_anchored(m) && !self.floating.iter().any(|f| f == m))
    }
}

pub fn open_archive(bytes: &[u8]) -> Result<SheetArchive<'_>, zip::result::ZipError> {
    ZipArchive::new(Cursor::new(bytes))
}

/// 读取归档条目原始字节
pub fn read_entry(archive: &mut SheetArchive<'_>, path: &str) -> Result<Vec<u8>, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("归档条目不存在 {}: {}", path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| format!("归档条目读取失败 {}: {}", path, e))?;
    Ok(bytes)
}

fn read_entry_text(archive: &mut SheetArchive<'_>, path: &str) -> Option<String> {
    let bytes = read_entry(archive, path).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// 读取第一个工作表的绘图信息
///
/// 任何部件缺失都按"无锚点"处理，不返回错误
///
/// 只有无法从 workbook 解析出第一个工作表时，才回退到约定路径 drawing1.xml
pub fn load_sheet_drawing(archive: &mut SheetArchive<'_>) -> SheetDrawing {
    let (sheet_path, drawing_path) = match first_sheet_path(archive) {
        Some(sheet_path) => {
            let drawing_path = drawing_path_for_sheet(archive, &sheet_path);
            (sheet_path, drawing_path)
        }
        None => {
            let drawing_path = drawing_path_for_sheet(archive, FALLBACK_SHEET_PATH).or_else(|| {
                archive
                    .index_for_name(FALLBACK_DRAWING_PATH)
                    .map(|_| FALLBACK_DRAWING_PATH.to_string())
            });
            (FALLBACK_SHEET_PATH.to_string(), drawing_path)
        }
    };

    let (anchors, floating) = match &drawing_path {
        Some(path) => load_anchors(archive, path),
        None => (Vec::new(), Vec::new()),
    };

    let foreign = foreign_drawing_media(archive, drawing_path.as_deref());
    let media: Vec<String> = list_raster_media(archive)
        .into_iter()
        .filter(|m| !foreign.contains(m))
        .collect();

    debug!(
        sheet = %sheet_path,
        drawing = ?drawing_path,
        anchors = anchors.len(),
        floating = floating.len(),
        media = media.len(),
        excluded = foreign.len(),
        "绘图部件解析完成"
    );

    SheetDrawing {
        anchors,
        floating,
        media,
    }
}

/// workbook.xml 第一个 sheet → 工作表部件路径
fn first_sheet_path(archive: &mut SheetArchive<'_>) -> Option<String> {
    let workbook_xml = read_entry_text(archive, WORKBOOK_PATH)?;
    let rid = first_sheet_relationship_id(&workbook_xml)?;
    let rels_xml = read_entry_text(archive, WORKBOOK_RELS_PATH)?;
    parse_relationships(&rels_xml)
        .into_iter()
        .find(|rel| rel.id == rid)
        .map(|rel| resolve_target(dir_of(WORKBOOK_PATH), &rel.target))
}

/// 工作表 rels 中 drawing 类型关系 → 绘图部件路径
fn drawing_path_for_sheet(archive: &mut SheetArchive<'_>, sheet_path: &str) -> Option<String> {
    let rels_xml = read_entry_text(archive, &rels_path_for(sheet_path))?;
    parse_relationships(&rels_xml)
        .into_iter()
        .find(|rel| rel.rel_type.ends_with("/drawing"))
        .map(|rel| resolve_target(dir_of(sheet_path), &rel.target))
}

/// 读取绘图部件: (单元格锚点, 绝对定位图片)
fn load_anchors(archive: &mut SheetArchive<'_>, drawing_path: &str) -> (Vec<CellAnchor>, Vec<String>) {
    let mut anchors = Vec::new();
    let mut floating = Vec::new();

    let Some(drawing_xml) = read_entry_text(archive, drawing_path) else {
        return (anchors, floating);
    };
    let pictures = parse_drawing(&drawing_xml);
    if pictures.is_empty() {
        return (anchors, floating);
    }

    let Some(rels_xml) = read_entry_text(archive, &rels_path_for(drawing_path)) else {
        debug!(drawing = %drawing_path, "绘图部件缺少 rels，无法解析图片引用");
        return (anchors, floating);
    };
    let targets: HashMap<String, String> = parse_relationships(&rels_xml)
        .into_iter()
        .map(|rel| (rel.id, resolve_target(dir_of(drawing_path), &rel.target)))
        .collect();

    for pic in pictures {
        let Some(media_path) = targets.get(&pic.embed_id).cloned() else {
            continue;
        };
        if !is_raster_media(&media_path) {
            debug!(media = %media_path, "跳过非光栅图片锚点");
            continue;
        }
        match pic.range {
            Some(range) => anchors.push(CellAnchor {
                from_row: range.from_row,
                from_col: range.from_col,
                to_row: range.to_row,
                to_col: range.to_col,
                media_path,
            }),
            None => {
                debug!(media = %media_path, "绝对定位图片不绑定行");
                floating.push(media_path);
            }
        }
    }

    (anchors, floating)
}

/// 其他绘图部件（属于其他工作表）引用的图片
fn foreign_drawing_media(archive: &mut SheetArchive<'_>, own_drawing: Option<&str>) -> HashSet<String> {
    let own_rels = own_drawing.map(rels_path_for);
    let rels_paths: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with(DRAWING_RELS_PREFIX) && name.ends_with(".rels"))
        .filter(|name| own_rels.as_deref() != Some(*name))
        .map(str::to_string)
        .collect();

    let mut foreign = HashSet::new();
    for rels_path in rels_paths {
        let Some(rels_xml) = read_entry_text(archive, &rels_path) else {
            continue;
        };
        // xl/drawings/_rels/drawing2.xml.rels 的目标相对于 xl/drawings
        let base_dir = dir_of(dir_of(&rels_path));
        foreign.extend(
            parse_relationships(&rels_xml)
                .into_iter()
                .map(|rel| resolve_target(base_dir, &rel.target)),
        );
    }
    foreign
}

/// xl/media 下的光栅图片（归档顺序）
fn list_raster_media(archive: &mut SheetArchive<'_>) -> Vec<String> {
    let mut media = Vec::new();
    for i in 0..archive.len() {
        let Ok(file) = archive.by_index(i) else {
            continue;
        };
        let name = file.name().to_string();
        if !file.is_dir() && name.starts_with(MEDIA_PREFIX) && is_raster_media(&name) {
            media.push(name);
        }
    }
    media
}

// ==========================================
// 部件路径工具
// ==========================================

fn dir_of(part_path: &str) -> &str {
    part_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// xl/worksheets/sheet1.xml → xl/worksheets/_rels/sheet1.xml.rels
fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_path),
    }
}

/// 解析关系目标：相对路径按部件目录拼接，"/" 开头为归档绝对路径
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

// ==========================================
// XML 解析
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AnchorRange {
    from_row: u32,
    from_col: u32,
    to_row: u32,
    to_col: u32,
}

/// 绘图中的一张图片；range 为 None 表示绝对定位（不绑定单元格）
#[derive(Debug, Clone, PartialEq, Eq)]
struct PictureRef {
    range: Option<AnchorRange>,
    embed_id: String,
}

fn attribute_value(element: &BytesStart<'_>, local_name: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.local_name().as_ref() == local_name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn parse_relationships(xml: &str) -> Vec<Relationship> {
    let mut relationships = Vec::new();
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"Relationship" {
                    continue;
                }
                let id = attribute_value(&e, b"Id");
                let target = attribute_value(&e, b"Target");
                if let (Some(id), Some(target)) = (id, target) {
                    relationships.push(Relationship {
                        id,
                        rel_type: attribute_value(&e, b"Type").unwrap_or_default(),
                        target,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "关系部件 XML 解析中断");
                break;
            }
            _ => {}
        }
    }

    relationships
}

fn first_sheet_relationship_id(workbook_xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(workbook_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    return attribute_value(&e, b"id");
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnchorKind {
    TwoCell,
    OneCell,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    From,
    To,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coord {
    Row,
    Col,
}

/// 解析绘图部件中的图片锚点
///
/// twoCellAnchor: from/to 范围；oneCellAnchor: 只有 from（to = from）；
/// absoluteAnchor: 不绑定单元格
fn parse_drawing(xml: &str) -> Vec<PictureRef> {
    let mut pictures = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut kind: Option<AnchorKind> = None;
    let mut marker: Option<Marker> = None;
    let mut coord: Option<Coord> = None;
    let mut range = AnchorRange::default();
    let mut embeds: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"twoCellAnchor" => {
                    kind = Some(AnchorKind::TwoCell);
                    range = AnchorRange::default();
                    embeds.clear();
                }
                b"oneCellAnchor" => {
                    kind = Some(AnchorKind::OneCell);
                    range = AnchorRange::default();
                    embeds.clear();
                }
                b"absoluteAnchor" => {
                    kind = Some(AnchorKind::Absolute);
                    embeds.clear();
                }
                b"from" if kind.is_some() => marker = Some(Marker::From),
                b"to" if kind.is_some() => marker = Some(Marker::To),
                b"row" if marker.is_some() => coord = Some(Coord::Row),
                b"col" if marker.is_some() => coord = Some(Coord::Col),
                b"blip" if kind.is_some() => {
                    if let Some(id) = attribute_value(&e, b"embed") {
                        embeds.push(id);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if kind.is_some() && e.local_name().as_ref() == b"blip" {
                    if let Some(id) = attribute_value(&e, b"embed") {
                        embeds.push(id);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(m), Some(c)) = (marker, coord) {
                    let value = std::str::from_utf8(&t)
                        .ok()
                        .and_then(|s| s.trim().parse::<u32>().ok());
                    if let Some(value) = value {
                        match (m, c) {
                            (Marker::From, Coord::Row) => range.from_row = value,
                            (Marker::From, Coord::Col) => range.from_col = value,
                            (Marker::To, Coord::Row) => range.to_row = value,
                            (Marker::To, Coord::Col) => range.to_col = value,
                        }
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"row" | b"col" => coord = None,
                b"from" | b"to" => marker = None,
                b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor" => {
                    let anchor_range = match kind {
                        Some(AnchorKind::TwoCell) => Some(range),
                        Some(AnchorKind::OneCell) => Some(AnchorRange {
                            to_row: range.from_row,
                            to_col: range.from_col,
                            ..range
                        }),
                        _ => None,
                    };
                    for embed_id in embeds.drain(..) {
                        pictures.push(PictureRef {
                            range: anchor_range,
                            embed_id,
                        });
                    }
                    kind = None;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "绘图部件 XML 解析中断");
                break;
            }
            _ => {}
        }
    }

    pictures
}
