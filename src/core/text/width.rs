//! Grapheme-cluster and visible-column width.

use std::cell::RefCell;
use std::collections::HashMap;

use emojis::get as emoji_get;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

use super::ansi::extract_escape;

const TAB_WIDTH: usize = 3;

// Width results for non-ASCII strings are memoized per thread. When the map
// grows past this bound it is dropped wholesale; no LRU bookkeeping.
const WIDTH_CACHE_MAX_ENTRIES: usize = 4096;

thread_local! {
    static WIDTH_CACHE: RefCell<HashMap<String, usize>> = RefCell::new(HashMap::new());
}

const VARIATION_SELECTOR_16: char = '\u{fe0f}';
const ZERO_WIDTH_JOINER: char = '\u{200d}';

/// Width policy for emoji-like clusters.
///
/// A cluster renders two columns wide when the RGI emoji table knows it, or when
/// its structure marks it as emoji (VS16, ZWJ composition, skin-tone modifier,
/// regional-indicator pair). The range table behind `emoji_get` is a policy
/// choice; swapping this function swaps the policy.
pub fn is_emoji_cluster(grapheme: &str) -> bool {
    if emoji_get(grapheme).is_some() {
        return true;
    }
    grapheme.chars().any(|ch| {
        ch == VARIATION_SELECTOR_16
            || ch == ZERO_WIDTH_JOINER
            || matches!(ch, '\u{1f3fb}'..='\u{1f3ff}')
            || matches!(ch, '\u{1f1e6}'..='\u{1f1ff}')
    })
}

/// Column width of a single grapheme cluster.
pub fn grapheme_width(grapheme: &str) -> usize {
    if grapheme.is_empty() {
        return 0;
    }
    if grapheme == "\t" {
        return TAB_WIDTH;
    }

    if is_emoji_cluster(grapheme) {
        return 2;
    }

    let mut width = 0;
    for ch in grapheme.chars() {
        if ch == '\t' {
            width += TAB_WIDTH;
            continue;
        }
        width += UnicodeWidthChar::width(ch).unwrap_or(0);
    }
    width
}

/// Visible column width of `input`, ignoring escape sequences.
///
/// Tabs count as a fixed three columns. Control, format, and combining clusters
/// count zero; emoji clusters count two; everything else uses its east-asian
/// width.
pub fn visible_width(input: &str) -> usize {
    if input.is_empty() {
        return 0;
    }
    if input.is_ascii() && !input.contains('\x1b') {
        return input
            .bytes()
            .map(|b| match b {
                b'\t' => TAB_WIDTH,
                0x20..=0x7e => 1,
                _ => 0,
            })
            .sum();
    }

    if let Some(cached) = WIDTH_CACHE.with(|cache| cache.borrow().get(input).copied()) {
        return cached;
    }

    let width = measure(input);

    WIDTH_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.len() >= WIDTH_CACHE_MAX_ENTRIES {
            cache.clear();
        }
        cache.insert(input.to_string(), width);
    });

    width
}

fn measure(input: &str) -> usize {
    let mut clean = String::with_capacity(input.len());
    let mut idx = 0;
    while idx < input.len() {
        if let Some(escape) = extract_escape(input, idx) {
            idx += escape.length;
            continue;
        }

        let Some(ch) = input[idx..].chars().next() else {
            break;
        };
        if ch == '\t' {
            clean.push_str("   ");
        } else {
            clean.push(ch);
        }
        idx += ch.len_utf8();
    }

    clean.graphemes(true).map(grapheme_width).sum()
}
