//! Weekly message rendering.
//!
//! Two budgets apply: the compact text form (previews, list replies) must fit
//! in one message body, the structured form gets a separate budget per block.
//! Overflow is never an error; output is cut at unit boundaries and marked.

pub mod format;
pub mod labels;

use std::sync::Arc;

use serde::Serialize;

use weekpost_types::config::WeeklyConfig;
use weekpost_types::models::{Category, ChangeEntry, WeekWindow};

use crate::format::{BoundedText, char_len, format_author, quote_block, resolve_emoji, truncate};
use crate::labels::{LabelKey, LabelLookup, StaticLabels, resolve};

pub const TEXT_BUDGET: usize = 1900;
pub const BLOCK_BUDGET: usize = 3500;

const ACCENT_WEEKLY: u32 = 0x74A3FF;
const ACCENT_TEST: u32 = 0xFFBE54;

/// Structured output: a top block followed by one block per category, in
/// Added, Changed, Removed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub blocks: Vec<String>,
    pub accent_color: u32,
}

#[derive(Clone)]
pub struct Renderer {
    labels: Arc<dyn LabelLookup>,
    text_budget: usize,
    block_budget: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(Arc::new(StaticLabels))
    }
}

/// Everything resolved from config and labels once per render.
struct Palette {
    title_emoji: String,
    notice_emoji: String,
    emojis: [String; 3],
    names: [String; 3],
    no_entries: String,
    no_text: String,
    truncated: String,
    unknown_author: String,
}

impl Palette {
    fn emoji(&self, category: Category) -> &str {
        &self.emojis[slot(category)]
    }

    fn name(&self, category: Category) -> &str {
        &self.names[slot(category)]
    }
}

fn slot(category: Category) -> usize {
    match category {
        Category::Added => 0,
        Category::Changed => 1,
        Category::Removed => 2,
    }
}

/// Split entries by category, keeping their order within each group.
fn partition(entries: &[ChangeEntry]) -> [Vec<&ChangeEntry>; 3] {
    let mut groups: [Vec<&ChangeEntry>; 3] = Default::default();
    for entry in entries {
        groups[slot(entry.category)].push(entry);
    }
    groups
}

impl Renderer {
    pub fn new(labels: Arc<dyn LabelLookup>) -> Self {
        Self {
            labels,
            text_budget: TEXT_BUDGET,
            block_budget: BLOCK_BUDGET,
        }
    }

    pub fn with_budgets(mut self, text_budget: usize, block_budget: usize) -> Self {
        self.text_budget = text_budget;
        self.block_budget = block_budget;
        self
    }

    pub fn label(&self, config: &WeeklyConfig, key: LabelKey) -> String {
        resolve(self.labels.as_ref(), config, key)
    }

    fn palette(&self, config: &WeeklyConfig) -> Palette {
        Palette {
            title_emoji: resolve_emoji(&config.title_emoji, "title"),
            notice_emoji: resolve_emoji(&config.notice_emoji, "notice"),
            emojis: [
                resolve_emoji(&config.added_emoji, "added"),
                resolve_emoji(&config.changed_emoji, "changed"),
                resolve_emoji(&config.removed_emoji, "removed"),
            ],
            names: [
                self.label(config, LabelKey::Added),
                self.label(config, LabelKey::Changed),
                self.label(config, LabelKey::Removed),
            ],
            no_entries: self.label(config, LabelKey::NoEntries),
            no_text: self.label(config, LabelKey::NoText),
            truncated: self.label(config, LabelKey::Truncated),
            unknown_author: self.label(config, LabelKey::UnknownAuthor),
        }
    }

    /// Compact single-body form of the weekly message.
    pub fn render_weekly_text(
        &self,
        week: &WeekWindow,
        entries: &[ChangeEntry],
        config: &WeeklyConfig,
    ) -> String {
        let p = self.palette(config);
        let mut out = format!(
            "{} {} [{}]\n\n",
            p.title_emoji,
            config.title_text,
            week.label()
        );
        out.push_str(&format!(
            "{} = {}, {} = {}, {} = {}\n\n",
            p.emojis[0], p.names[0], p.emojis[1], p.names[1], p.emojis[2], p.names[2]
        ));
        out.push_str(&format!("{} {}\n\n", p.notice_emoji, config.notice_text));

        let used = char_len(&out);
        if used >= self.text_budget {
            return truncate(&out, self.text_budget);
        }
        out.push_str(&self.ordered_lines(&p, entries, &config.no_change_text, self.text_budget - used));
        truncate(&out, self.text_budget)
    }

    /// Short listing of the week for command replies.
    pub fn render_list(
        &self,
        week: &WeekWindow,
        entries: &[ChangeEntry],
        config: &WeeklyConfig,
    ) -> String {
        let p = self.palette(config);
        let mut out = format!(
            "{} [{}]\n",
            self.label(config, LabelKey::CurrentWeek),
            week.label()
        );
        if entries.is_empty() {
            out.push_str(&format!("- {}", p.no_entries));
            return truncate(&out, self.text_budget);
        }

        let used = char_len(&out);
        if used < self.text_budget {
            out.push_str(&self.ordered_lines(&p, entries, &p.no_entries, self.text_budget - used));
        }
        truncate(&out, self.text_budget)
    }

    /// Structured form used for the canonical weekly post.
    pub fn render_weekly(
        &self,
        week: &WeekWindow,
        entries: &[ChangeEntry],
        config: &WeeklyConfig,
    ) -> RenderedMessage {
        self.render_structured(week, entries, config, false)
    }

    /// Structured form marked as a test; never recorded as the week's post.
    pub fn render_test(
        &self,
        week: &WeekWindow,
        entries: &[ChangeEntry],
        config: &WeeklyConfig,
    ) -> RenderedMessage {
        self.render_structured(week, entries, config, true)
    }

    fn render_structured(
        &self,
        week: &WeekWindow,
        entries: &[ChangeEntry],
        config: &WeeklyConfig,
        test_mode: bool,
    ) -> RenderedMessage {
        let p = self.palette(config);

        let prefix = if test_mode {
            format!("## 🧪 {} • ", self.label(config, LabelKey::TestPrefix))
        } else {
            "## ".to_string()
        };
        let mut top = format!(
            "{}{} {} [{}]\n{} {} • {} {} • {} {}\n\n> {} {}",
            prefix,
            p.title_emoji,
            config.title_text,
            week.label(),
            p.emojis[0],
            p.names[0],
            p.emojis[1],
            p.names[1],
            p.emojis[2],
            p.names[2],
            p.notice_emoji,
            config.notice_text
        );
        if test_mode {
            top.push_str(&format!("\n> {}", self.label(config, LabelKey::TestNotice)));
        }

        let groups = partition(entries);
        let mut blocks = Vec::with_capacity(4);
        blocks.push(truncate(&top, self.block_budget));
        for category in Category::ALL {
            blocks.push(self.category_block(&p, category, &groups[slot(category)]));
        }

        RenderedMessage {
            blocks,
            accent_color: if test_mode { ACCENT_TEST } else { ACCENT_WEEKLY },
        }
    }

    /// One category in the structured form, cut to its own budget.
    fn category_block(&self, p: &Palette, category: Category, group: &[&ChangeEntry]) -> String {
        let mut out = format!("### {} {}\n", p.emoji(category), p.name(category));
        if group.is_empty() {
            out.push_str(&format!("> {}", p.no_entries));
            return truncate(&out, self.block_budget);
        }

        let reserve = char_len(&p.truncated) + 1;
        let mut used = char_len(&out);
        for (i, entry) in group.iter().enumerate() {
            let mut block = format!(
                "• **`#{}`** {}\n{}",
                entry.id,
                format_author(&entry.author, &p.unknown_author),
                quote_block(&entry.content, &p.no_text)
            );
            if i > 0 {
                block.insert(0, '\n');
            }
            let n = char_len(&block);
            if used + n + reserve > self.block_budget {
                out.push('\n');
                out.push_str(&p.truncated);
                break;
            }
            out.push_str(&block);
            used += n;
        }
        truncate(out.trim(), self.block_budget)
    }

    /// Category sections in fixed order, appended unit by unit within `budget`.
    fn ordered_lines(
        &self,
        p: &Palette,
        entries: &[ChangeEntry],
        empty_text: &str,
        budget: usize,
    ) -> String {
        if entries.is_empty() {
            return format!("> {}", empty_text);
        }

        let groups = partition(entries);
        let mut out = BoundedText::new(budget, &p.truncated);
        'sections: for category in Category::ALL {
            if !out.is_empty() && !out.push("\n\n") {
                break;
            }
            let emoji = p.emoji(category);
            if !out.push(&format!("{} **{}**\n", emoji, p.name(category))) {
                break;
            }
            let group = &groups[slot(category)];
            if group.is_empty() {
                if !out.push(&format!("> {}\n", p.no_entries)) {
                    break;
                }
                continue;
            }
            for entry in group {
                let line = format!(
                    "{} › {} -> {} `#{}`\n",
                    emoji,
                    entry.content,
                    format_author(&entry.author, &p.unknown_author),
                    entry.id
                );
                if !out.push(&line) {
                    break 'sections;
                }
            }
        }
        out.into_string().trim().to_string()
    }
}
