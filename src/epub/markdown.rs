//! HTML to markdown conversion for chapter bodies
//!
//! Walks a tolerant html5ever tree (via scraper) and writes flat markdown
//! meant for reading, not for round-tripping:
//! - headings become `#` lines, `ul` items `- `, `ol` items `N. `
//! - `pre` becomes a fenced block
//! - images are dropped and links are flattened to their text
//!
//! Text is not markdown-escaped.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Elements whose whole subtree produces no output
const SKIPPED: &[&str] = &[
    "head", "script", "style", "svg", "img", "image", "picture", "template", "noscript",
    "iframe", "object", "video", "audio", "map",
];

/// Elements rendered as paragraphs separated by blank lines
const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "aside", "figure", "figcaption",
    "main", "nav", "address", "center", "hgroup", "details", "summary", "dl", "dt", "dd",
    "caption", "form", "fieldset",
];

/// Convert an HTML/XHTML document to markdown.
///
/// Returns `None` when the source has no `<body>` element. html5ever would
/// synthesize one, so presence is checked on the source text.
pub fn html_to_markdown(html: &str) -> Option<String> {
    if !has_body_tag(html) {
        return None;
    }

    let document = Html::parse_document(html);
    let selector = Selector::parse("body").ok()?;
    let body = document.select(&selector).next()?;
    Some(render(body))
}

/// Render an element's children as markdown
pub fn render(element: ElementRef<'_>) -> String {
    let mut renderer = Renderer::default();
    renderer.walk(element);
    renderer.finish()
}

fn has_body_tag(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    let mut rest = lower.as_str();
    while let Some(pos) = rest.find("<body") {
        let after = &rest[pos + "<body".len()..];
        match after.chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_ascii_whitespace() => return true,
            _ => rest = after,
        }
    }
    false
}

fn is_html_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

/// Longest run of backticks in `text`
fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Separation requested before the next piece of output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Separation {
    Line,
    Blank,
}

/// Line prefixes stop growing past this length
const MAX_PREFIX_LEN: usize = 128;

/// Emphasis markers are only written this many levels deep
const MAX_EMPHASIS_DEPTH: usize = 16;

/// Work item for the iterative tree walk
enum Frame<'a> {
    Enter(ElementRef<'a>),
    Text(&'a str),
    Exit(Exit),
}

/// Closing action for an element whose children have been rendered
enum Exit {
    Heading,
    Block,
    Quote { saved: usize },
    List { separation: Separation },
    Item { saved: usize },
    Emphasis { marker: &'static str },
    /// Between two table cells
    Cell,
    Row,
}

/// Push `element`'s children so they pop off in document order
fn push_children<'a>(stack: &mut Vec<Frame<'a>>, element: ElementRef<'a>) {
    let start = stack.len();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => stack.push(Frame::Text(&**text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    stack.push(Frame::Enter(child));
                }
            }
            _ => {}
        }
    }
    stack[start..].reverse();
}

#[derive(Debug)]
struct ListState {
    ordered: bool,
    counter: usize,
}

#[derive(Default)]
struct Renderer {
    out: String,
    /// Written at the start of every line (blockquote markers, list indent)
    prefix: String,
    at_line_start: bool,
    line_has_content: bool,
    pending: Option<Separation>,
    pending_space: bool,
    /// A list or heading marker was just written; swallow separations
    after_marker: bool,
    lists: Vec<ListState>,
    heading_depth: usize,
    emphasis_depth: usize,
}

impl Renderer {
    fn finish(self) -> String {
        self.out.trim_start_matches('\n').trim_end().to_string()
    }

    /// Render `root`'s subtree. Uses an explicit stack, so input nesting
    /// depth is bounded by memory rather than by the thread's stack.
    fn walk(&mut self, root: ElementRef<'_>) {
        let mut stack = Vec::new();
        push_children(&mut stack, root);

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Text(text) => self.write_text(text),
                Frame::Enter(element) => self.enter(element, &mut stack),
                Frame::Exit(exit) => self.exit(exit),
            }
        }
    }

    fn enter<'a>(&mut self, element: ElementRef<'a>, stack: &mut Vec<Frame<'a>>) {
        let name = element.value().name();

        if SKIPPED.contains(&name) {
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                self.request(Separation::Blank);
                self.write_marker(&format!("{} ", "#".repeat(level)));
                self.heading_depth += 1;
                stack.push(Frame::Exit(Exit::Heading));
            }
            "ul" | "ol" => self.open_list(element, name == "ol", stack),
            "li" => self.open_list_item(stack),
            "pre" => return self.code_block(element),
            "code" | "kbd" | "samp" | "tt" => return self.inline_code(element),
            "blockquote" => {
                self.request(Separation::Blank);
                let saved = self.push_prefix("> ");
                stack.push(Frame::Exit(Exit::Quote { saved }));
            }
            "strong" | "b" => self.open_emphasis(element, "**", stack),
            "em" | "i" | "cite" => self.open_emphasis(element, "_", stack),
            "br" => {
                if self.heading_depth > 0 {
                    self.pending_space = true;
                } else {
                    self.request(Separation::Line);
                }
                return;
            }
            "hr" => {
                self.request(Separation::Blank);
                self.write_inline("---");
                self.request(Separation::Blank);
                return;
            }
            "tr" => return self.open_table_row(element, stack),
            "table" => {
                self.request(Separation::Blank);
                stack.push(Frame::Exit(Exit::Block));
            }
            _ if BLOCKS.contains(&name) => {
                self.request(Separation::Blank);
                stack.push(Frame::Exit(Exit::Block));
            }
            // a, span and any other inline element: text only
            _ => {}
        }

        push_children(stack, element);
    }

    fn exit(&mut self, exit: Exit) {
        match exit {
            Exit::Heading => {
                self.heading_depth -= 1;
                self.request(Separation::Blank);
            }
            Exit::Block => self.request(Separation::Blank),
            Exit::Quote { saved } => {
                self.prefix.truncate(saved);
                self.request(Separation::Blank);
            }
            Exit::List { separation } => {
                self.lists.pop();
                self.request(separation);
            }
            Exit::Item { saved } => {
                self.prefix.truncate(saved);
                self.request(Separation::Line);
            }
            Exit::Emphasis { marker } => {
                self.emphasis_depth -= 1;
                if self.at_line_start {
                    self.write_inline(marker);
                } else {
                    self.out.push_str(marker);
                    self.line_has_content = true;
                }
            }
            Exit::Cell => {
                self.pending_space = true;
                self.write_inline("|");
                self.pending_space = true;
            }
            Exit::Row => self.request(Separation::Line),
        }
    }

    /// Extend the line prefix, returning the length to truncate back to
    fn push_prefix(&mut self, s: &str) -> usize {
        let saved = self.prefix.len();
        if saved < MAX_PREFIX_LEN {
            self.prefix.push_str(s);
        }
        saved
    }

    fn open_list<'a>(&mut self, element: ElementRef<'a>, ordered: bool, stack: &mut Vec<Frame<'a>>) {
        let nested = !self.lists.is_empty();
        let separation = if nested { Separation::Line } else { Separation::Blank };

        let start = if ordered {
            element
                .value()
                .attr("start")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(1)
        } else {
            1
        };

        self.request(separation);
        self.lists.push(ListState {
            ordered,
            counter: start.saturating_sub(1),
        });
        stack.push(Frame::Exit(Exit::List { separation }));
    }

    fn open_list_item(&mut self, stack: &mut Vec<Frame<'_>>) {
        self.request(Separation::Line);

        let marker = match self.lists.last_mut() {
            Some(list) if list.ordered => {
                list.counter += 1;
                format!("{}. ", list.counter)
            }
            _ => "- ".to_string(),
        };

        self.write_marker(&marker);
        let saved = self.push_prefix(&" ".repeat(marker.len()));
        stack.push(Frame::Exit(Exit::Item { saved }));
    }

    fn code_block(&mut self, element: ElementRef<'_>) {
        let code: String = element.text().collect();
        let code = code.trim_start_matches(['\n', '\r']).trim_end();
        let fence = "`".repeat(longest_backtick_run(code).max(2) + 1);

        self.request(Separation::Blank);
        self.write_verbatim_line(&fence);
        for line in code.lines() {
            self.write_verbatim_line(line);
        }
        self.write_verbatim_line(&fence);
        self.request(Separation::Blank);
    }

    fn inline_code(&mut self, element: ElementRef<'_>) {
        let code: String = element.text().collect();
        let code = code.replace(['\n', '\r'], " ");
        if code.trim().is_empty() {
            return;
        }
        let ticks = "`".repeat(longest_backtick_run(&code) + 1);
        self.write_inline(&format!("{ticks}{code}{ticks}"));
    }

    fn open_emphasis<'a>(&mut self, element: ElementRef<'a>, marker: &'static str, stack: &mut Vec<Frame<'a>>) {
        if self.emphasis_depth >= MAX_EMPHASIS_DEPTH {
            return;
        }
        let has_text = element.text().any(|t| !t.trim().is_empty());
        if !has_text {
            return;
        }

        self.write_inline(marker);
        // no space between the opening marker and the text
        self.line_has_content = false;
        self.emphasis_depth += 1;
        stack.push(Frame::Exit(Exit::Emphasis { marker }));
    }

    fn open_table_row<'a>(&mut self, element: ElementRef<'a>, stack: &mut Vec<Frame<'a>>) {
        self.request(Separation::Line);
        let cells: Vec<ElementRef<'a>> = element
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "td" | "th"))
            .collect();

        stack.push(Frame::Exit(Exit::Row));
        for (index, cell) in cells.into_iter().enumerate().rev() {
            push_children(stack, cell);
            if index > 0 {
                stack.push(Frame::Exit(Exit::Cell));
            }
        }
    }

    fn write_text(&mut self, text: &str) {
        let words: Vec<&str> = text.split(is_html_space).filter(|w| !w.is_empty()).collect();
        if words.is_empty() {
            if !text.is_empty() {
                self.pending_space = true;
            }
            return;
        }

        if text.starts_with(is_html_space) {
            self.pending_space = true;
        }
        self.write_inline(&words.join(" "));
        if text.ends_with(is_html_space) {
            self.pending_space = true;
        }
    }

    fn request(&mut self, separation: Separation) {
        if self.heading_depth > 0 {
            self.pending_space = true;
            return;
        }
        self.pending = Some(match self.pending {
            Some(current) => current.max(separation),
            None => separation,
        });
    }

    fn flush_separation(&mut self) {
        let Some(separation) = self.pending.take() else {
            return;
        };
        if self.after_marker || self.out.is_empty() {
            return;
        }

        if !self.at_line_start {
            self.newline();
        }
        if separation == Separation::Blank {
            self.out.push_str(self.prefix.trim_end());
            self.out.push('\n');
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
        self.line_has_content = false;
        self.pending_space = false;
    }

    fn start_line_if_needed(&mut self) -> bool {
        if self.at_line_start || self.out.is_empty() {
            self.out.push_str(&self.prefix);
            self.at_line_start = false;
            return true;
        }
        false
    }

    fn write_inline(&mut self, s: &str) {
        self.flush_separation();
        let fresh_line = self.start_line_if_needed();
        if !fresh_line && self.pending_space && self.line_has_content {
            self.out.push(' ');
        }
        self.out.push_str(s);
        self.pending_space = false;
        self.line_has_content = true;
        self.after_marker = false;
    }

    fn write_marker(&mut self, marker: &str) {
        self.flush_separation();
        if !self.start_line_if_needed() && self.line_has_content {
            self.newline();
            self.out.push_str(&self.prefix);
            self.at_line_start = false;
        }
        self.out.push_str(marker);
        self.pending_space = false;
        self.line_has_content = false;
        self.after_marker = true;
    }

    fn write_verbatim_line(&mut self, line: &str) {
        self.flush_separation();
        if !self.at_line_start && !self.out.is_empty() {
            self.newline();
        }
        if line.is_empty() {
            self.out.push_str(self.prefix.trim_end());
        } else {
            self.out.push_str(&self.prefix);
            self.out.push_str(line);
        }
        self.at_line_start = false;
        self.line_has_content = true;
        self.pending_space = false;
        self.after_marker = false;
    }
}
