use std::collections::HashSet;

use crate::log_warn;

// ============================================================================
// THREAD COLOR — one catalog / active-palette entry
// ============================================================================

/// A thread color: catalog code, display name and RGB, plus the
/// active-palette-only fields (symbol, lock, usage count).
///
/// Entries in the active palette are always independent clones of catalog
/// entries; mutating one never affects the catalog or any other clone.
#[derive(Clone, Debug)]
pub struct ThreadColor {
    pub code: String,
    pub name: String,
    pub rgb: [u8; 3],
    /// Printable symbol used in the pattern legend. Unique within an active
    /// palette; unset on catalog entries.
    pub symbol: Option<String>,
    /// Locked entries survive every palette rebuild/reduction.
    pub locked: bool,
    /// Opaque cells currently classifying to this entry (derived).
    pub count: usize,
}

impl ThreadColor {
    pub fn new(code: impl Into<String>, name: impl Into<String>, rgb: [u8; 3]) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            rgb,
            symbol: None,
            locked: false,
            count: 0,
        }
    }
}

/// Catalog codes are opaque identifiers compared case-insensitively.
#[inline]
pub fn code_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

// ============================================================================
// CATALOG PARSING — `code,name,R,G,B` CSV with a header row
// ============================================================================

/// Parse one catalog row. Returns `None` for rows with missing fields or
/// non-numeric color components; the caller skips those.
pub fn parse_catalog_line(line: &str) -> Option<ThreadColor> {
    let mut parts = line.split(',');
    let code = parts.next()?.trim();
    let name = parts.next()?.trim();
    let r = parts.next()?.trim().parse::<u8>().ok()?;
    let g = parts.next()?.trim().parse::<u8>().ok()?;
    let b = parts.next()?.trim().parse::<u8>().ok()?;
    if code.is_empty() {
        return None;
    }
    Some(ThreadColor::new(code, name, [r, g, b]))
}

/// Parse a whole catalog file (first line is the header). Malformed rows
/// are skipped and logged; well-formed rows are kept and sorted by code.
pub fn parse_catalog(text: &str) -> Vec<ThreadColor> {
    let mut skipped = 0usize;
    let mut catalog: Vec<ThreadColor> = text
        .lines()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match parse_catalog_line(l) {
            Some(c) => Some(c),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        log_warn!("catalog: skipped {} malformed row(s)", skipped);
    }
    catalog.sort_by(|a, b| {
        a.code
            .to_ascii_lowercase()
            .cmp(&b.code.to_ascii_lowercase())
    });
    catalog
}

// ============================================================================
// NEAREST-COLOR CLASSIFICATION
// ============================================================================

#[inline]
fn dist_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Index of the palette entry nearest to `rgb` by squared Euclidean RGB
/// distance. Equidistant candidates resolve to the earliest palette
/// position (strict `<`), making the result deterministic and order-stable.
/// `None` only for an empty palette.
///
/// Transparency is the caller's concern: transparent cells are never
/// classified.
pub fn nearest_index(rgb: [u8; 3], palette: &[ThreadColor]) -> Option<usize> {
    let mut best = u32::MAX;
    let mut best_idx = None;
    for (i, entry) in palette.iter().enumerate() {
        let d = dist_sq(rgb, entry.rgb);
        if d < best {
            best = d;
            best_idx = Some(i);
        }
    }
    best_idx
}

/// Reference form of [`nearest_index`].
pub fn nearest_in_palette<'a>(rgb: [u8; 3], palette: &'a [ThreadColor]) -> Option<&'a ThreadColor> {
    nearest_index(rgb, palette).map(|i| &palette[i])
}

// ============================================================================
// SYMBOL INVENTORY — ordered glyphs for pattern legends
// ============================================================================

/// Fixed, ordered glyph inventory. Assignment walks this list front to back
/// and falls back to decimal strings ("1", "2", …) once it is exhausted.
pub const SYMBOL_CHOICES: &[&str] = &[
    // Geometric shapes
    "●", "○", "■", "□", "▲", "△", "▼", "▽", "◆", "◇", "★", "☆", "⬤", "⬥", "⬧", "⬢", "⬣",
    "▣", "▤", "▥", "▦", "▧", "▨", "▩", "▮", "▯", "▰", "▱",
    "◉", "◎", "◍", "◌", "◐", "◑", "◒", "◓", "◔", "◕", "◖", "◗",
    "◘", "◙", "◜", "◝", "◞", "◟", "◠", "◡", "◢", "◣", "◤", "◥", "◦", "◯",
    // Crosses and stars
    "✚", "✖", "✛", "✜", "✢", "✣", "✤", "✥", "✦", "✧", "✩", "✪", "✫", "✬", "✭", "✮", "✯",
    "✰", "✱", "✲", "✳", "✴", "✵", "✶", "✷", "✸", "✹", "✺", "✻", "✼", "✽", "✾", "✿",
    "❀", "❁", "❂", "❃", "❄", "❅", "❆", "❇", "❈", "❉", "❊", "❋",
    // Squares and blocks
    "▢", "▪", "▫", "◼", "◻", "◾", "◽",
    // Arrows
    "←", "↑", "→", "↓", "↔", "↕", "↖", "↗", "↘", "↙",
    "⇄", "⇅", "⇆", "⇇", "⇈", "⇉", "⇊", "⇋", "⇌",
    // Triangles and pointers
    "◀", "▶", "◁", "▷", "◂", "▸", "◄", "►", "▴", "▵", "▾", "▿",
    // Dice-style pips
    "⚀", "⚁", "⚂", "⚃", "⚄", "⚅",
    // Miscellaneous shapes
    "☐", "☑", "☒", "☓", "☩", "☮", "☯", "☸", "☼", "☽", "☾",
    "♠", "♣", "♥", "♦", "♤", "♧", "♡", "♢", "♩", "♪", "♫", "♬", "♭", "♮", "♯",
    // Greek letters
    "α", "β", "γ", "δ", "ε", "ζ", "η", "θ", "ι", "κ", "λ", "μ",
    "ν", "ξ", "ο", "π", "ρ", "σ", "τ", "υ", "φ", "χ", "ψ", "ω",
    // Uppercase Latin letters
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M",
    "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
    // Digits
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
];

/// First glyph not present in `used`: inventory order, then synthetic
/// decimal strings once the inventory runs out.
fn next_free_symbol(used: &HashSet<String>) -> String {
    for s in SYMBOL_CHOICES {
        if !used.contains(*s) {
            return (*s).to_string();
        }
    }
    let mut i = 1usize;
    loop {
        let s = i.to_string();
        if !used.contains(&s) {
            return s;
        }
        i += 1;
    }
}

// ============================================================================
// ACTIVE PALETTE — the bounded working set
// ============================================================================

/// The ordered, code-unique working palette used for quantization and
/// export. Distinct from the master catalog; every entry is a clone.
///
/// Invariant: no two entries share a symbol, and no two entries share a
/// code (case-insensitive). All mutation paths below re-establish this.
#[derive(Default, Clone)]
pub struct ActivePalette {
    entries: Vec<ThreadColor>,
}

impl ActivePalette {
    pub fn entries(&self) -> &[ThreadColor] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [ThreadColor] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, code: &str) -> Option<&ThreadColor> {
        self.entries.iter().find(|e| code_eq(&e.code, code))
    }

    /// Clone a catalog entry into the active set. Deduplicated by code;
    /// returns `false` when the code is already present. The clone gets the
    /// first free symbol if it arrives without one.
    pub fn add_clone(&mut self, source: &ThreadColor) -> bool {
        if self.find(&source.code).is_some() {
            return false;
        }
        let mut entry = source.clone();
        entry.count = 0;
        self.entries.push(entry);
        self.ensure_symbols();
        true
    }

    /// Remove an entry by code. `false` when absent.
    pub fn remove(&mut self, code: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !code_eq(&e.code, code));
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn set_locked(&mut self, code: &str, locked: bool) -> bool {
        match self.entries.iter_mut().find(|e| code_eq(&e.code, code)) {
            Some(e) => {
                e.locked = locked;
                true
            }
            None => false,
        }
    }

    /// Set an entry's symbol, then repair any duplicate this created.
    pub fn set_symbol(&mut self, code: &str, symbol: impl Into<String>) -> bool {
        let symbol = symbol.into();
        match self.entries.iter_mut().find(|e| code_eq(&e.code, code)) {
            Some(e) => {
                e.symbol = Some(symbol);
                self.enforce_unique_symbols();
                true
            }
            None => false,
        }
    }

    /// Locked entries, deduplicated by code, in palette order.
    pub fn locked_entries(&self) -> Vec<ThreadColor> {
        let mut seen: HashSet<String> = HashSet::new();
        self.entries
            .iter()
            .filter(|e| e.locked && seen.insert(e.code.to_ascii_lowercase()))
            .cloned()
            .collect()
    }

    /// Replace the whole set (palette rebuild/reduction result) and fill in
    /// missing symbols. Entries carrying a symbol — locked survivors in
    /// particular — keep it.
    pub fn replace(&mut self, entries: Vec<ThreadColor>) {
        self.entries = entries;
        self.ensure_symbols();
    }

    /// Assign the first unused inventory glyph to every entry lacking one.
    /// Deterministic for a fixed entry ordering.
    pub fn ensure_symbols(&mut self) {
        let mut used: HashSet<String> = self
            .entries
            .iter()
            .filter_map(|e| e.symbol.clone())
            .collect();
        for entry in &mut self.entries {
            if entry.symbol.as_deref().is_none_or(str::is_empty) {
                let s = next_free_symbol(&used);
                used.insert(s.clone());
                entry.symbol = Some(s);
            }
        }
    }

    /// Discard all current symbols and deal fresh ones in palette order.
    pub fn assign_symbols_sequential(&mut self) {
        let mut used: HashSet<String> = HashSet::new();
        for entry in &mut self.entries {
            let s = next_free_symbol(&used);
            used.insert(s.clone());
            entry.symbol = Some(s);
        }
    }

    /// Re-assign later duplicates so every symbol is unique again. The
    /// first holder of a symbol keeps it.
    pub fn enforce_unique_symbols(&mut self) {
        let mut used: HashSet<String> = HashSet::new();
        for entry in &mut self.entries {
            match &entry.symbol {
                Some(s) if used.contains(s) => {
                    let fresh = next_free_symbol(&used);
                    used.insert(fresh.clone());
                    entry.symbol = Some(fresh);
                }
                Some(s) => {
                    used.insert(s.clone());
                }
                None => {}
            }
        }
    }

    pub(crate) fn reset_counts(&mut self) {
        for e in &mut self.entries {
            e.count = 0;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
