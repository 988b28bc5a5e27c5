//! Type mapping table
//!
//! One static row per canonical item type with a cell per format. A cell is
//! either exact or approximate (`lossy`); a missing cell means the format has
//! no counterpart and the format's generic type is used instead.

use citebridge_domain::{Entry, Format, ItemType};

/// A format-specific type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCell {
    pub name: &'static str,
    /// EndNote `ref-type` code
    pub code: Option<u16>,
    /// The format type only approximates the canonical one
    pub lossy: bool,
}

const fn exact(name: &'static str) -> Option<TypeCell> {
    Some(TypeCell {
        name,
        code: None,
        lossy: false,
    })
}

const fn approx(name: &'static str) -> Option<TypeCell> {
    Some(TypeCell {
        name,
        code: None,
        lossy: true,
    })
}

const fn ref_type(name: &'static str, code: u16) -> Option<TypeCell> {
    Some(TypeCell {
        name,
        code: Some(code),
        lossy: false,
    })
}

const fn ref_type_approx(name: &'static str, code: u16) -> Option<TypeCell> {
    Some(TypeCell {
        name,
        code: Some(code),
        lossy: true,
    })
}

struct TypeRow {
    item_type: ItemType,
    bibtex: Option<TypeCell>,
    biblatex: Option<TypeCell>,
    ris: Option<TypeCell>,
    endnote: Option<TypeCell>,
}

const fn row(
    item_type: ItemType,
    bibtex: Option<TypeCell>,
    biblatex: Option<TypeCell>,
    ris: Option<TypeCell>,
    endnote: Option<TypeCell>,
) -> TypeRow {
    TypeRow {
        item_type,
        bibtex,
        biblatex,
        ris,
        endnote,
    }
}

impl TypeRow {
    fn cell(&self, format: Format) -> Option<TypeCell> {
        match format {
            Format::BibTeX => self.bibtex,
            Format::BibLaTeX => self.biblatex,
            Format::Ris => self.ris,
            Format::EndNote => self.endnote,
            Format::CslJson => exact(self.item_type.as_str()),
        }
    }
}

#[rustfmt::skip]
const TYPE_TABLE: &[TypeRow] = &[
    row(ItemType::ArticleJournal, exact("article"), exact("article"), exact("JOUR"), ref_type("Journal Article", 17)),
    row(ItemType::Article, approx("article"), approx("article"), approx("JOUR"), ref_type_approx("Journal Article", 17)),
    row(ItemType::ArticleMagazine, approx("article"), approx("article"), exact("MGZN"), ref_type("Magazine Article", 19)),
    row(ItemType::ArticleNewspaper, approx("article"), approx("article"), exact("NEWS"), ref_type("Newspaper Article", 23)),
    row(ItemType::Bill, None, approx("legislation"), exact("BILL"), ref_type("Bill", 4)),
    row(ItemType::Book, exact("book"), exact("book"), exact("BOOK"), ref_type("Book", 6)),
    row(ItemType::Broadcast, approx("misc"), approx("misc"), approx("VIDEO"), ref_type("Film or Broadcast", 21)),
    row(ItemType::Chapter, exact("incollection"), exact("incollection"), exact("CHAP"), ref_type("Book Section", 5)),
    row(ItemType::Classic, approx("book"), approx("book"), exact("CLSWK"), ref_type("Classical Work", 49)),
    row(ItemType::Collection, approx("book"), exact("collection"), exact("EDBOOK"), ref_type("Edited Book", 28)),
    row(ItemType::Dataset, approx("misc"), exact("dataset"), exact("DATA"), ref_type("Dataset", 59)),
    row(ItemType::Document, exact("misc"), exact("misc"), exact("GEN"), ref_type("Generic", 13)),
    row(ItemType::Entry, approx("inbook"), exact("inreference"), approx("GEN"), ref_type_approx("Generic", 13)),
    row(ItemType::EntryDictionary, approx("inbook"), approx("inreference"), exact("DICT"), ref_type("Dictionary", 52)),
    row(ItemType::EntryEncyclopedia, approx("inbook"), approx("inreference"), exact("ENCYC"), ref_type("Encyclopedia", 53)),
    row(ItemType::Event, None, None, None, None),
    row(ItemType::Figure, approx("misc"), approx("misc"), exact("FIGURE"), ref_type("Figure", 37)),
    row(ItemType::Graphic, approx("misc"), exact("artwork"), exact("ART"), ref_type("Artwork", 2)),
    row(ItemType::Hearing, None, None, exact("HEAR"), ref_type("Hearing", 14)),
    row(ItemType::Interview, approx("misc"), approx("misc"), approx("PCOMM"), ref_type("Interview", 64)),
    row(ItemType::LegalCase, None, exact("jurisdiction"), exact("CASE"), ref_type("Case", 7)),
    row(ItemType::Legislation, None, exact("legislation"), exact("STAT"), ref_type("Statute", 31)),
    row(ItemType::Manuscript, approx("unpublished"), approx("unpublished"), exact("MANSCPT"), ref_type("Manuscript", 36)),
    row(ItemType::Map, approx("misc"), approx("misc"), exact("MAP"), ref_type("Map", 20)),
    row(ItemType::MotionPicture, approx("misc"), exact("movie"), exact("MPCT"), ref_type_approx("Film or Broadcast", 21)),
    row(ItemType::MusicalScore, approx("misc"), exact("music"), exact("MUSIC"), ref_type("Music", 61)),
    row(ItemType::Pamphlet, exact("booklet"), exact("booklet"), exact("PAMP"), ref_type("Pamphlet", 24)),
    row(ItemType::PaperConference, exact("inproceedings"), exact("inproceedings"), exact("CPAPER"), ref_type("Conference Paper", 47)),
    row(ItemType::Patent, approx("misc"), exact("patent"), exact("PAT"), ref_type("Patent", 25)),
    row(ItemType::Performance, None, None, None, None),
    row(ItemType::Periodical, None, exact("periodical"), exact("SER"), ref_type("Serial", 57)),
    row(ItemType::PersonalCommunication, approx("misc"), exact("letter"), exact("PCOMM"), ref_type("Personal Communication", 26)),
    row(ItemType::PostWeblog, approx("misc"), approx("online"), exact("BLOG"), ref_type("Blog", 56)),
    row(ItemType::Post, approx("misc"), approx("online"), approx("BLOG"), ref_type_approx("Blog", 56)),
    row(ItemType::Regulation, None, approx("legislation"), exact("LEGAL"), ref_type("Legal Rule or Regulation", 50)),
    row(ItemType::Report, exact("techreport"), exact("report"), exact("RPRT"), ref_type("Report", 27)),
    row(ItemType::Review, approx("article"), exact("review"), approx("JOUR"), ref_type_approx("Journal Article", 17)),
    row(ItemType::ReviewBook, approx("article"), approx("review"), approx("JOUR"), ref_type_approx("Journal Article", 17)),
    row(ItemType::Software, approx("misc"), exact("software"), exact("COMP"), ref_type("Computer Program", 9)),
    row(ItemType::Song, approx("misc"), exact("audio"), exact("SOUND"), ref_type_approx("Music", 61)),
    row(ItemType::Speech, approx("misc"), approx("misc"), approx("GEN"), ref_type_approx("Generic", 13)),
    row(ItemType::Standard, approx("techreport"), exact("standard"), exact("STAND"), ref_type("Standard", 58)),
    row(ItemType::Thesis, exact("phdthesis"), exact("thesis"), exact("THES"), ref_type("Thesis", 32)),
    row(ItemType::Treaty, None, None, None, None),
    row(ItemType::Webpage, approx("misc"), exact("online"), exact("ELEC"), ref_type("Web Page", 12)),
];

/// Format-specific type names that are not the preferred cell of any row
#[rustfmt::skip]
const TYPE_ALIASES: &[(Format, &str, ItemType)] = &[
    // BibTeX and BibLaTeX share one alias list
    (Format::BibTeX, "conference", ItemType::PaperConference),
    (Format::BibTeX, "mastersthesis", ItemType::Thesis),
    (Format::BibTeX, "phdthesis", ItemType::Thesis),
    (Format::BibTeX, "techreport", ItemType::Report),
    (Format::BibTeX, "www", ItemType::Webpage),
    (Format::BibTeX, "electronic", ItemType::Webpage),
    (Format::BibTeX, "inbook", ItemType::Chapter),
    (Format::BibTeX, "bookinbook", ItemType::Chapter),
    (Format::BibTeX, "suppbook", ItemType::Chapter),
    (Format::BibTeX, "suppcollection", ItemType::Chapter),
    (Format::BibTeX, "proceedings", ItemType::Book),
    (Format::BibTeX, "mvbook", ItemType::Book),
    (Format::BibTeX, "reference", ItemType::Book),
    (Format::BibTeX, "mvreference", ItemType::Book),
    (Format::BibTeX, "mvproceedings", ItemType::Book),
    (Format::BibTeX, "mvcollection", ItemType::Collection),
    (Format::BibTeX, "manual", ItemType::Report),
    (Format::BibTeX, "unpublished", ItemType::Manuscript),
    (Format::BibTeX, "suppperiodical", ItemType::ArticleJournal),
    (Format::BibTeX, "video", ItemType::MotionPicture),
    (Format::BibTeX, "image", ItemType::Graphic),
    // RIS
    (Format::Ris, "EJOUR", ItemType::ArticleJournal),
    (Format::Ris, "ABST", ItemType::ArticleJournal),
    (Format::Ris, "INPR", ItemType::ArticleJournal),
    (Format::Ris, "JFULL", ItemType::Periodical),
    (Format::Ris, "CONF", ItemType::PaperConference),
    (Format::Ris, "CPAPER", ItemType::PaperConference),
    (Format::Ris, "ELEC", ItemType::Webpage),
    (Format::Ris, "ICOMM", ItemType::Webpage),
    (Format::Ris, "WEB", ItemType::Webpage),
    (Format::Ris, "EBOOK", ItemType::Book),
    (Format::Ris, "ECHAP", ItemType::Chapter),
    (Format::Ris, "UNPB", ItemType::Manuscript),
    (Format::Ris, "DBASE", ItemType::Dataset),
    (Format::Ris, "AGGR", ItemType::Dataset),
    (Format::Ris, "VIDEO", ItemType::MotionPicture),
    (Format::Ris, "ADVS", ItemType::MotionPicture),
    (Format::Ris, "CHART", ItemType::Figure),
    (Format::Ris, "GOVDOC", ItemType::Report),
    (Format::Ris, "ANCIENT", ItemType::Classic),
    (Format::Ris, "PRESS", ItemType::ArticleNewspaper),
    // EndNote, by ref-type name
    (Format::EndNote, "Electronic Article", ItemType::ArticleJournal),
    (Format::EndNote, "Electronic Book", ItemType::Book),
    (Format::EndNote, "Electronic Book Section", ItemType::Chapter),
    (Format::EndNote, "Conference Proceedings", ItemType::PaperConference),
    (Format::EndNote, "Unpublished Work", ItemType::Manuscript),
    (Format::EndNote, "Government Document", ItemType::Report),
    (Format::EndNote, "Aggregated Database", ItemType::Dataset),
    (Format::EndNote, "Online Database", ItemType::Dataset),
    (Format::EndNote, "Audiovisual Material", ItemType::MotionPicture),
    (Format::EndNote, "Online Multimedia", ItemType::MotionPicture),
    (Format::EndNote, "Chart or Table", ItemType::Figure),
    (Format::EndNote, "Press Release", ItemType::ArticleNewspaper),
    (Format::EndNote, "Ancient Text", ItemType::Classic),
];

/// EndNote ref-type codes of the aliased names above
const ENDNOTE_ALIAS_CODES: &[(u16, &str)] = &[
    (43, "Electronic Article"),
    (44, "Electronic Book"),
    (60, "Electronic Book Section"),
    (10, "Conference Proceedings"),
    (34, "Unpublished Work"),
    (46, "Government Document"),
    (55, "Aggregated Database"),
    (45, "Online Database"),
    (3, "Audiovisual Material"),
    (48, "Online Multimedia"),
    (38, "Chart or Table"),
    (63, "Press Release"),
    (51, "Ancient Text"),
];

/// Result of mapping a canonical type into a format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    pub name: String,
    /// EndNote `ref-type` code
    pub code: Option<u16>,
    pub lossy: bool,
}

impl TypeMapping {
    fn from_cell(cell: TypeCell) -> Self {
        Self {
            name: cell.name.to_string(),
            code: cell.code,
            lossy: cell.lossy,
        }
    }
}

/// The generic type of a format, used when no cell exists
pub fn fallback_type(format: Format) -> TypeCell {
    match format {
        Format::BibTeX | Format::BibLaTeX => TypeCell {
            name: "misc",
            code: None,
            lossy: true,
        },
        Format::Ris => TypeCell {
            name: "GEN",
            code: None,
            lossy: true,
        },
        Format::EndNote => TypeCell {
            name: "Generic",
            code: Some(13),
            lossy: true,
        },
        Format::CslJson => TypeCell {
            name: "document",
            code: None,
            lossy: true,
        },
    }
}

fn type_row(item_type: ItemType) -> Option<&'static TypeRow> {
    TYPE_TABLE.iter().find(|row| row.item_type == item_type)
}

/// Map a canonical type to its counterpart in `target`
pub fn map_type_to_format(item_type: ItemType, target: Format) -> TypeMapping {
    let cell = type_row(item_type)
        .and_then(|row| row.cell(target))
        .unwrap_or_else(|| fallback_type(target));
    if cell.lossy {
        tracing::trace!(
            "Lossy type mapping: {} -> {} '{}'",
            item_type,
            target,
            cell.name
        );
    }
    TypeMapping::from_cell(cell)
}

/// Type to write for an entry, reusing the type it was parsed from when the
/// target reads the same family and the recorded type still means the same
/// canonical type.
pub fn resolve_entry_type(entry: &Entry, target: Format) -> TypeMapping {
    if let Some(metadata) = &entry.metadata {
        if let (Some(source), Some(original)) = (metadata.source_format, &metadata.original_type) {
            let (mapped, recognized) = map_type_from_format(original, source);
            if target.shares_family_with(source) && recognized && mapped == entry.item_type {
                let code = (target == Format::EndNote)
                    .then(|| endnote_code(original))
                    .flatten();
                if target != Format::EndNote || code.is_some() {
                    return TypeMapping {
                        name: original.clone(),
                        code,
                        lossy: false,
                    };
                }
            }
        }
    }
    map_type_to_format(entry.item_type, target)
}

/// Map a format-specific type to the canonical type.
///
/// Returns the canonical type and whether the format type was recognized;
/// unrecognized types map to `document`.
pub fn map_type_from_format(format_type: &str, source: Format) -> (ItemType, bool) {
    let format_type = format_type.trim();

    if source == Format::CslJson {
        return match ItemType::from_csl(format_type) {
            Some(item_type) => (item_type, true),
            None => (ItemType::Document, false),
        };
    }

    if source == Format::EndNote {
        if let Ok(code) = format_type.parse::<u16>() {
            return match endnote_name(code) {
                Some(name) => map_type_from_format(name, Format::EndNote),
                None => (ItemType::Document, false),
            };
        }
    }

    let alias_format = if source.is_bibtex_family() {
        Format::BibTeX
    } else {
        source
    };
    if let Some((_, _, item_type)) = TYPE_ALIASES
        .iter()
        .find(|(f, name, _)| *f == alias_format && name.eq_ignore_ascii_case(format_type))
    {
        return (*item_type, true);
    }

    // BibTeX files routinely use BibLaTeX types and vice versa
    let columns = match source {
        Format::BibTeX => vec![Format::BibTeX, Format::BibLaTeX],
        Format::BibLaTeX => vec![Format::BibLaTeX, Format::BibTeX],
        other => vec![other],
    };
    for column in columns {
        let found = TYPE_TABLE.iter().find(|row| {
            row.cell(column)
                .is_some_and(|cell| !cell.lossy && cell.name.eq_ignore_ascii_case(format_type))
        });
        if let Some(row) = found {
            return (row.item_type, true);
        }
    }

    (ItemType::Document, false)
}

/// EndNote ref-type code for a ref-type name
pub fn endnote_code(name: &str) -> Option<u16> {
    TYPE_TABLE
        .iter()
        .filter_map(|row| row.endnote)
        .find(|cell| cell.name.eq_ignore_ascii_case(name))
        .and_then(|cell| cell.code)
        .or_else(|| {
            ENDNOTE_ALIAS_CODES
                .iter()
                .find(|(_, alias)| alias.eq_ignore_ascii_case(name))
                .map(|(code, _)| *code)
        })
}

/// EndNote ref-type name for a code
pub fn endnote_name(code: u16) -> Option<&'static str> {
    TYPE_TABLE
        .iter()
        .filter_map(|row| row.endnote)
        .find(|cell| cell.code == Some(code))
        .map(|cell| cell.name)
        .or_else(|| {
            ENDNOTE_ALIAS_CODES
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, name)| *name)
        })
}
