//! CRS hint companion (`.prj`).
//!
//! The hint is either a bare authority code (`EPSG:4326`) or a WKT
//! definition. WKT is parsed into a small keyword tree and recognized by
//! its root keyword; only the systems [`Crs`] can model are understood.

use crate::error::{Result, StoreError};
use shapestore_types::crs::{Crs, CrsKind, Ellipsoid};
use std::path::Path;

/// One `KEYWORD[arg, ...]` element of a WKT string.
#[derive(Debug, Clone, PartialEq)]
pub struct WktNode {
    pub keyword: String,
    pub args: Vec<WktValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WktValue {
    Node(WktNode),
    Text(String),
    Number(f64),
    /// Unquoted enumeration value such as `EAST`
    Word(String),
}

impl WktNode {
    fn is(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.keyword.eq_ignore_ascii_case(k))
    }

    fn children(&self) -> impl Iterator<Item = &WktNode> {
        self.args.iter().filter_map(|a| match a {
            WktValue::Node(n) => Some(n),
            _ => None,
        })
    }

    /// First direct child with one of `keywords`.
    pub fn child(&self, keywords: &[&str]) -> Option<&WktNode> {
        self.children().find(|n| n.is(keywords))
    }

    /// First descendant (depth first) with one of `keywords`.
    pub fn find(&self, keywords: &[&str]) -> Option<&WktNode> {
        for child in self.children() {
            if child.is(keywords) {
                return Some(child);
            }
            if let Some(found) = child.find(keywords) {
                return Some(found);
            }
        }
        None
    }

    /// The node's name, its first quoted argument.
    pub fn name(&self) -> Option<&str> {
        match self.args.first() {
            Some(WktValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    fn number(&self, index: usize) -> Option<f64> {
        match self.args.get(index) {
            Some(WktValue::Number(n)) => Some(*n),
            Some(WktValue::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn text(&self, index: usize) -> Option<String> {
        match self.args.get(index) {
            Some(WktValue::Text(s)) | Some(WktValue::Word(s)) => Some(s.clone()),
            Some(WktValue::Number(n)) => Some(format!("{n}")),
            _ => None,
        }
    }
}

/// Deepest bracket nesting accepted in a WKT string.
const MAX_WKT_DEPTH: usize = 64;

struct WktParser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> WktParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn ident(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_alphanumeric() || self.src[self.pos] == b'_')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn quoted(&mut self) -> Option<String> {
        // Opening quote already peeked.
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            let b = *self.src.get(self.pos)?;
            self.pos += 1;
            if b == b'"' {
                if self.src.get(self.pos) == Some(&b'"') {
                    out.push(b'"');
                    self.pos += 1;
                    continue;
                }
                return Some(String::from_utf8_lossy(&out).into_owned());
            }
            out.push(b);
        }
    }

    fn number(&mut self) -> Option<f64> {
        let start = self.pos;
        while self.pos < self.src.len()
            && matches!(self.src[self.pos], b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E')
        {
            self.pos += 1;
        }
        std::str::from_utf8(&self.src[start..self.pos]).ok()?.parse().ok()
    }

    fn node(&mut self) -> Option<WktNode> {
        let keyword = self.ident()?;
        self.args(keyword)
    }

    fn args(&mut self, keyword: String) -> Option<WktNode> {
        if self.depth >= MAX_WKT_DEPTH {
            return None;
        }
        self.depth += 1;
        let node = self.bracketed(keyword);
        self.depth -= 1;
        node
    }

    fn bracketed(&mut self, keyword: String) -> Option<WktNode> {
        let close = match self.peek()? {
            b'[' => b']',
            b'(' => b')',
            _ => return None,
        };
        self.pos += 1;
        let mut args = Vec::new();
        if self.peek()? == close {
            self.pos += 1;
            return Some(WktNode { keyword, args });
        }
        loop {
            args.push(self.value()?);
            match self.peek()? {
                b',' => self.pos += 1,
                b if b == close => {
                    self.pos += 1;
                    return Some(WktNode { keyword, args });
                }
                _ => return None,
            }
        }
    }

    fn value(&mut self) -> Option<WktValue> {
        match self.peek()? {
            b'"' => self.quoted().map(WktValue::Text),
            b'0'..=b'9' | b'-' | b'+' | b'.' => self.number().map(WktValue::Number),
            _ => {
                let word = self.ident()?;
                match self.peek() {
                    Some(b'[' | b'(') => self.args(word).map(WktValue::Node),
                    _ => Some(WktValue::Word(word)),
                }
            }
        }
    }
}

/// Parse a WKT string into its root node.
pub fn parse_wkt(text: &str) -> Option<WktNode> {
    let mut parser = WktParser {
        src: text.as_bytes(),
        pos: 0,
        depth: 0,
    };
    parser.node()
}

fn authority_code(node: &WktNode) -> Option<String> {
    let auth = node.child(&["AUTHORITY", "ID"])?;
    Some(format!("{}:{}", auth.text(0)?, auth.text(1)?))
}

fn ellipsoid_of(node: &WktNode) -> Option<Ellipsoid> {
    let e = node.find(&["SPHEROID", "ELLIPSOID"])?;
    Some(Ellipsoid::from_inverse_flattening(e.number(1)?, e.number(2)?))
}

fn is_web_mercator(node: &WktNode) -> bool {
    let name = node.name().unwrap_or_default().to_ascii_lowercase();
    let method = node
        .find(&["PROJECTION", "METHOD"])
        .and_then(WktNode::name)
        .unwrap_or_default()
        .to_ascii_lowercase();
    name.contains("web_mercator")
        || name.contains("web mercator")
        || name.contains("pseudo-mercator")
        || (method.contains("mercator")
            && (method.contains("auxiliary") || method.contains("pseudo") || method.contains("popular")))
}

/// Resolve a parsed WKT tree to a [`Crs`].
pub fn crs_from_wkt(root: &WktNode) -> Option<Crs> {
    let code = authority_code(root);
    if let Some(known) = code.as_deref().and_then(Crs::from_code) {
        return Some(known);
    }
    let id = code
        .or_else(|| root.name().map(str::to_string))
        .unwrap_or_else(|| root.keyword.clone());

    if root.is(&["PROJCS", "PROJCRS", "PROJECTEDCRS"]) {
        return is_web_mercator(root).then(Crs::web_mercator);
    }

    let geocentric = root.is(&["GEOCCS"])
        || (root.is(&["GEODCRS", "GEODETICCRS"])
            && root
                .child(&["CS"])
                .and_then(|cs| cs.text(0))
                .is_some_and(|t| t.eq_ignore_ascii_case("cartesian")));
    let ellipsoid = ellipsoid_of(root)?;
    if geocentric {
        return Some(Crs::new(id, CrsKind::Geocentric { ellipsoid }));
    }
    if root.is(&["GEOGCS", "GEOGCRS", "GEOGRAPHICCRS", "GEODCRS", "GEODETICCRS"]) {
        return Some(Crs::new(id, CrsKind::Geographic { ellipsoid }));
    }
    None
}

/// Interpret the text of a CRS hint: a bare code or WKT.
pub fn parse_crs_hint(text: &str) -> Option<Crs> {
    let text = text.trim().trim_start_matches('\u{feff}');
    if text.is_empty() {
        return None;
    }
    if !text.contains(['[', '(']) {
        return Crs::from_code(text.lines().next().unwrap_or_default());
    }
    parse_wkt(text).as_ref().and_then(crs_from_wkt)
}

/// Read and interpret a hint file. `Ok(None)` means the hint was present but
/// not understood.
pub fn read_crs_hint(path: &Path) -> Result<Option<Crs>> {
    let raw = std::fs::read(path).map_err(|e| StoreError::io_at(path, e))?;
    let text = String::from_utf8_lossy(&raw);
    let crs = parse_crs_hint(&text);
    if crs.is_none() {
        log::warn!("Could not interpret CRS hint {}", path.display());
    }
    Ok(crs)
}
