use owo_colors::Style;
use std::sync::OnceLock;

use crate::token::TokenKind;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub info: Style,
    pub dim: Style,
    pub muted: Style,
    /// Search match markers in excerpts
    pub matched: Style,
    pub keyword: Style,
    pub builtin: Style,
    pub string: Style,
    pub number: Style,
    pub comment: Style,
    pub operator: Style,
    /// Field and table IDs
    pub identity: Style,
}

impl Theme {
    pub fn detect() -> Self {
        if !console::Term::stdout().is_term() {
            return Self::plain();
        }
        Self::colored()
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            info: Style::new().magenta(),
            dim: Style::new().white().dimmed(),
            muted: Style::new().bright_black(),
            matched: Style::new().black().on_yellow(),
            keyword: Style::new().blue().bold(),
            builtin: Style::new().cyan(),
            string: Style::new().green(),
            number: Style::new().magenta(),
            comment: Style::new().bright_black().italic(),
            operator: Style::new().yellow(),
            identity: Style::new().red(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            error: Style::new(),
            warn: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            muted: Style::new(),
            matched: Style::new(),
            keyword: Style::new(),
            builtin: Style::new(),
            string: Style::new(),
            number: Style::new(),
            comment: Style::new(),
            operator: Style::new(),
            identity: Style::new(),
        }
    }

    /// Style of a token kind; `None` for kinds printed as-is.
    pub fn token(&self, kind: TokenKind) -> Option<Style> {
        match kind {
            TokenKind::Keyword => Some(self.keyword.clone()),
            TokenKind::Builtin => Some(self.builtin.clone()),
            TokenKind::String => Some(self.string.clone()),
            TokenKind::Number => Some(self.number.clone()),
            TokenKind::Comment => Some(self.comment.clone()),
            TokenKind::Operator => Some(self.operator.clone()),
            TokenKind::Field | TokenKind::Table => Some(self.identity.clone()),
            TokenKind::Punctuation
            | TokenKind::Identifier
            | TokenKind::Whitespace
            | TokenKind::Newline => None,
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
