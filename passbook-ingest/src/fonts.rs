//! Page font resources: how string bytes map to Unicode and how far each glyph
//! advances.
//!
//! Simple fonts decode through their `/Encoding` (WinAnsi, MacRoman, plus
//! `/Differences`) unless a `/ToUnicode` map is present. Composite (Type0) fonts
//! must carry `/ToUnicode`; their glyph ids alone do not identify characters.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Advance for glyphs with no width entry, in thousandths of an em.
/// Exact for Courier, the usual font of generated statements.
const DEFAULT_WIDTH: f32 = 600.0;
const MAX_INHERIT_DEPTH: usize = 32;
const MAX_RANGE: usize = 0x1_0000;

const WIN_ANSI_80: [char; 32] = [
    '€', '\u{fffd}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{fffd}', 'Ž',
    '\u{fffd}', '\u{fffd}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
    '\u{fffd}', 'ž', 'Ÿ',
];

const MAC_ROMAN_HIGH: &str = "ÄÅÇÉÑÖÜáàâäãåçéèêëíìîïñóòôöõúùûü\
†°¢£§•¶ß®©™´¨≠ÆØ∞±≤≥¥µ∂∑∏π∫ªºΩæø\
¿¡¬√ƒ≈∆«»…\u{a0}ÀÃÕŒœ–—“”‘’÷◊ÿŸ⁄€‹›ﬁﬂ\
‡·‚„‰ÂÊÁËÈÍÎÏÌÓÔ\u{f8ff}ÒÚÛÙıˆ˜¯˘˙˚¸˝˛ˇ";

const GLYPH_NAMES: &[(&str, char)] = &[
    ("space", ' '),
    ("zero", '0'),
    ("one", '1'),
    ("two", '2'),
    ("three", '3'),
    ("four", '4'),
    ("five", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("nine", '9'),
    ("period", '.'),
    ("comma", ','),
    ("hyphen", '-'),
    ("slash", '/'),
    ("colon", ':'),
    ("semicolon", ';'),
    ("parenleft", '('),
    ("parenright", ')'),
    ("ampersand", '&'),
    ("at", '@'),
    ("numbersign", '#'),
    ("percent", '%'),
    ("plus", '+'),
    ("asterisk", '*'),
    ("underscore", '_'),
    ("quotesingle", '\''),
    ("quotedbl", '"'),
    ("quoteleft", '‘'),
    ("quoteright", '’'),
    ("quotedblleft", '“'),
    ("quotedblright", '”'),
    ("endash", '–'),
    ("emdash", '—'),
    ("bullet", '•'),
    ("Euro", '€'),
    ("sterling", '£'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimpleEncoding {
    WinAnsi,
    MacRoman,
}

impl SimpleEncoding {
    /// StandardEncoding and unknown names decode as WinAnsi; they agree on ASCII.
    fn from_name(name: &[u8]) -> Self {
        match name {
            b"MacRomanEncoding" => SimpleEncoding::MacRoman,
            _ => SimpleEncoding::WinAnsi,
        }
    }

    fn decode(self, code: u8) -> char {
        match (self, code) {
            (_, 0..=0x7f) => code as char,
            (SimpleEncoding::WinAnsi, 0x80..=0x9f) => WIN_ANSI_80[(code - 0x80) as usize],
            (SimpleEncoding::WinAnsi, _) => code as char,
            (SimpleEncoding::MacRoman, _) => MAC_ROMAN_HIGH
                .chars()
                .nth((code - 0x80) as usize)
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        }
    }
}

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Usually one char; ligatures map to several, unmapped codes to none.
    pub text: String,
    /// Advance in ems.
    pub width: f32,
    /// Single-byte code 32, the only code word spacing applies to.
    pub is_space: bool,
}

/// A parsed `/ToUnicode` CMap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicode {
    code_bytes: Option<usize>,
    map: HashMap<u32, String>,
}

impl ToUnicode {
    /// Reads `codespacerange`, `bfchar` and `bfrange` sections; everything else
    /// in the CMap program is ignored.
    pub fn parse(src: &[u8]) -> Self {
        let tokens = tokenize(src);
        let mut cmap = ToUnicode::default();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "begincodespacerange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(_))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        if cmap.code_bytes.is_none() && !lo.is_empty() {
                            cmap.code_bytes = Some(lo.len());
                        }
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(code)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.map.insert(code_of(code), utf16_text(dst, 0));
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        let (lo, hi) = (code_of(lo), code_of(hi));
                        match tokens.get(i + 2) {
                            Some(Token::Hex(dst)) => {
                                for (offset, code) in (lo..=hi).take(MAX_RANGE).enumerate() {
                                    cmap.map.insert(code, utf16_text(dst, offset as u16));
                                }
                                i += 3;
                            }
                            Some(Token::Open) => {
                                let mut j = i + 3;
                                let mut code = lo;
                                while let Some(Token::Hex(dst)) = tokens.get(j) {
                                    if code <= hi {
                                        cmap.map.insert(code, utf16_text(dst, 0));
                                    }
                                    code = code.saturating_add(1);
                                    j += 1;
                                }
                                // past the closing bracket
                                i = j + 1;
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        cmap
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || b"<>[]()/%{}".contains(&b)
}

fn hex_bytes(src: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = src
        .iter()
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn tokenize(src: &[u8]) -> Vec<Token> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < src.len() {
        let b = src[i];
        match b {
            b'%' => {
                while i < src.len() && src[i] != b'\n' && src[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' | b'>' if src.get(i + 1) == Some(&b) => {
                out.push(Token::Word(String::from_utf8_lossy(&src[i..i + 2]).into_owned()));
                i += 2;
            }
            b'<' => {
                let end = src[i + 1..]
                    .iter()
                    .position(|&c| c == b'>')
                    .map_or(src.len(), |p| i + 1 + p);
                out.push(Token::Hex(hex_bytes(&src[i + 1..end])));
                i = end + 1;
            }
            b'[' => {
                out.push(Token::Open);
                i += 1;
            }
            b']' => {
                out.push(Token::Close);
                i += 1;
            }
            b'(' => {
                let mut depth = 0usize;
                while i < src.len() {
                    match src[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                i += 1;
                while i < src.len() && !is_delimiter(src[i]) {
                    i += 1;
                }
                out.push(Token::Word(String::from_utf8_lossy(&src[start..i]).into_owned()));
            }
        }
    }

    out
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// UTF-16BE destination string, with `offset` added to its last code unit.
fn utf16_text(bytes: &[u8], offset: u16) -> String {
    let mut units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect();
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset);
    }
    String::from_utf16_lossy(&units)
}

fn glyph_char(name: &[u8]) -> Option<char> {
    let name = std::str::from_utf8(name).ok()?;
    if let Some(hex) = name.strip_prefix("uni").filter(|h| h.len() == 4) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c);
        }
    }
    GLYPH_NAMES.iter().find(|(n, _)| *n == name).map(|(_, c)| *c)
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
}

fn array_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Vec<Object>> {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
}

fn stream_bytes(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// `/Resources` of a page, following `/Parent` for inherited resources.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Some(resources) = dict_entry(doc, node, b"Resources") {
            return Some(resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

/// Decoding and metrics for one font resource.
#[derive(Debug, Clone, PartialEq)]
pub struct FontInfo {
    name: String,
    composite: bool,
    encoding: SimpleEncoding,
    differences: HashMap<u8, char>,
    to_unicode: Option<ToUnicode>,
    widths: HashMap<u32, f32>,
    default_width: f32,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            composite: false,
            encoding: SimpleEncoding::WinAnsi,
            differences: HashMap::new(),
            to_unicode: None,
            widths: HashMap::new(),
            default_width: DEFAULT_WIDTH,
        }
    }
}

impl FontInfo {
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let mut font = FontInfo {
            name: dict
                .get(b"BaseFont")
                .and_then(Object::as_name)
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .unwrap_or_else(|_| "unnamed".to_string()),
            composite: dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Type0".as_slice()),
            to_unicode: dict
                .get(b"ToUnicode")
                .ok()
                .and_then(|obj| resolve(doc, obj))
                .and_then(|obj| obj.as_stream().ok())
                .and_then(stream_bytes)
                .map(|bytes| ToUnicode::parse(&bytes)),
            ..FontInfo::default()
        };

        if font.composite {
            font.load_cid_metrics(doc, dict);
        } else {
            font.load_simple_encoding(doc, dict);
            font.load_simple_widths(doc, dict);
        }
        font
    }

    fn load_simple_encoding(&mut self, doc: &Document, dict: &Dictionary) {
        match dict.get(b"Encoding").ok().and_then(|obj| resolve(doc, obj)) {
            Some(Object::Name(name)) => self.encoding = SimpleEncoding::from_name(name),
            Some(Object::Dictionary(enc)) => {
                if let Ok(base) = enc.get(b"BaseEncoding").and_then(Object::as_name) {
                    self.encoding = SimpleEncoding::from_name(base);
                }
                if let Some(diffs) = array_entry(doc, enc, b"Differences") {
                    let mut code: u32 = 0;
                    for item in diffs {
                        match item {
                            Object::Name(name) => {
                                if let (Ok(byte), Some(c)) = (u8::try_from(code), glyph_char(name)) {
                                    self.differences.insert(byte, c);
                                }
                                code += 1;
                            }
                            other => {
                                if let Some(start) = number(other) {
                                    code = start as u32;
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn load_simple_widths(&mut self, doc: &Document, dict: &Dictionary) {
        if let Some(missing) = dict_entry(doc, dict, b"FontDescriptor")
            .and_then(|fd| fd.get(b"MissingWidth").ok())
            .and_then(number)
            .filter(|w| *w > 0.0)
        {
            self.default_width = missing;
        }
        let first = dict.get(b"FirstChar").ok().and_then(number).unwrap_or(0.0) as u32;
        if let Some(widths) = array_entry(doc, dict, b"Widths") {
            for (i, w) in widths.iter().enumerate() {
                if let Some(w) = resolve(doc, w).and_then(number) {
                    self.widths.insert(first + i as u32, w);
                }
            }
        }
    }

    /// `/DW` and `/W` of the descendant CIDFont. Codes are taken as CIDs
    /// (Identity encodings).
    fn load_cid_metrics(&mut self, doc: &Document, dict: &Dictionary) {
        let Some(descendant) = array_entry(doc, dict, b"DescendantFonts")
            .and_then(|fonts| fonts.first())
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            return;
        };

        self.default_width = descendant.get(b"DW").ok().and_then(number).unwrap_or(1000.0);

        let Some(w) = array_entry(doc, descendant, b"W") else {
            return;
        };
        let mut i = 0;
        while i < w.len() {
            let Some(first) = number(&w[i]).map(|f| f as u32) else {
                break;
            };
            match w.get(i + 1).and_then(|obj| resolve(doc, obj)) {
                Some(Object::Array(list)) => {
                    for (k, width) in list.iter().enumerate() {
                        if let Some(width) = number(width) {
                            self.widths.insert(first + k as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let (Some(last), Some(width)) = (number(last), w.get(i + 2).and_then(number))
                    else {
                        break;
                    };
                    for cid in (first..=last as u32).take(MAX_RANGE) {
                        self.widths.insert(cid, width);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    fn width(&self, code: u32) -> f32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    fn code_bytes(&self) -> usize {
        if self.composite {
            self.to_unicode
                .as_ref()
                .and_then(|t| t.code_bytes)
                .unwrap_or(2)
        } else {
            1
        }
    }

    /// Split a string operand into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<Glyph>, String> {
        if self.composite && self.to_unicode.is_none() {
            return Err(format!(
                "composite font {} has no ToUnicode map; its text cannot be decoded",
                self.name
            ));
        }

        let code_bytes = self.code_bytes();
        Ok(bytes
            .chunks(code_bytes)
            .map(|chunk| {
                let code = code_of(chunk);
                let text = match self.to_unicode.as_ref().and_then(|t| t.get(code)) {
                    Some(mapped) => mapped.to_string(),
                    None if self.composite => char::REPLACEMENT_CHARACTER.to_string(),
                    None => self.simple_char(code as u8).to_string(),
                };
                Glyph {
                    text,
                    width: self.width(code) / 1000.0,
                    is_space: code_bytes == 1 && code == 32,
                }
            })
            .collect())
    }

    fn simple_char(&self, code: u8) -> char {
        self.differences
            .get(&code)
            .copied()
            .unwrap_or_else(|| self.encoding.decode(code))
    }
}

/// Fonts named in a page's resources, keyed by resource name (`F1`).
#[derive(Debug, Clone, Default)]
pub struct PageFonts {
    fonts: HashMap<Vec<u8>, FontInfo>,
    fallback: FontInfo,
}

impl PageFonts {
    pub fn load(doc: &Document, page_id: ObjectId) -> Self {
        let mut fonts = HashMap::new();
        if let Some(font_dict) =
            page_resources(doc, page_id).and_then(|res| dict_entry(doc, res, b"Font"))
        {
            for (name, obj) in font_dict.iter() {
                if let Some(dict) = resolve(doc, obj).and_then(|o| o.as_dict().ok()) {
                    fonts.insert(name.clone(), FontInfo::from_dict(doc, dict));
                }
            }
        }
        Self {
            fonts,
            fallback: FontInfo::default(),
        }
    }

    /// The named font, or WinAnsi with default widths when the resource is missing.
    pub fn font(&self, name: Option<&[u8]>) -> &FontInfo {
        name.and_then(|n| self.fonts.get(n)).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
