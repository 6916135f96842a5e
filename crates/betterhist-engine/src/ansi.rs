//! Escape-sequence scanner.
//!
//! Splits decoded terminal text into printable characters, C0 controls and
//! complete escape sequences. State survives across calls so a sequence may
//! be split between chunks.

const MAX_CSI_LEN: usize = 64;
const MAX_STRING_LEN: usize = 4096;

const ESC: char = '\x1b';
const BEL: char = '\x07';
const ST: char = '\u{9c}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(char),
    Control(char),
    Csi(Csi),
    /// Operating system command payload (without introducer or terminator).
    Osc(String),
    /// Any other escape sequence; carries no meaning for the line model.
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Csi {
    pub params: String,
    pub intermediates: String,
    pub final_char: char,
    /// The sequence exactly as it appeared in the stream.
    pub raw: String,
}

impl Csi {
    /// Select Graphic Rendition, i.e. colors and text attributes.
    pub fn is_sgr(&self) -> bool {
        self.final_char == 'm'
            && self.intermediates.is_empty()
            && !self.params.starts_with(['<', '=', '>', '?'])
    }

    /// Numeric parameter `index`, with `default` for missing or zero values.
    pub fn param(&self, index: usize, default: usize) -> usize {
        self.params
            .split(';')
            .nth(index)
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|&n| n != 0)
            .unwrap_or(default)
    }

    pub fn is_private(&self) -> bool {
        self.params.starts_with(['<', '=', '>', '?'])
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    Csi,
    Osc,
    OscEscape,
    /// DCS, SOS, PM and APC strings are consumed and discarded.
    Str,
    StrEscape,
}

#[derive(Debug, Default)]
pub struct AnsiScanner {
    state: State,
    buf: String,
}

impl AnsiScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan(&mut self, text: &str, out: &mut Vec<Token>) {
        for ch in text.chars() {
            self.advance(ch, out);
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Ground;
        self.buf.clear();
    }

    fn advance(&mut self, ch: char, out: &mut Vec<Token>) {
        match self.state {
            State::Ground => match ch {
                ESC => self.begin(State::Escape),
                c if c.is_control() => out.push(Token::Control(c)),
                c => out.push(Token::Text(c)),
            },

            State::Escape => match ch {
                '[' => self.begin(State::Csi),
                ']' => self.begin(State::Osc),
                'P' | 'X' | '^' | '_' => self.begin(State::Str),
                ESC => {}
                ' '..='/' => self.state = State::EscapeIntermediate,
                '0'..='~' => {
                    self.state = State::Ground;
                    out.push(Token::Escape);
                }
                c => {
                    self.state = State::Ground;
                    if c.is_control() {
                        out.push(Token::Control(c));
                    }
                }
            },

            State::EscapeIntermediate => match ch {
                ' '..='/' => {}
                '0'..='~' => {
                    self.state = State::Ground;
                    out.push(Token::Escape);
                }
                ESC => self.begin(State::Escape),
                _ => self.state = State::Ground,
            },

            State::Csi => match ch {
                '@'..='~' => {
                    self.state = State::Ground;
                    out.push(Token::Csi(self.finish_csi(ch)));
                }
                ' '..='?' => {
                    self.buf.push(ch);
                    if self.buf.len() > MAX_CSI_LEN {
                        self.reset();
                    }
                }
                ESC => self.begin(State::Escape),
                c if c.is_control() => out.push(Token::Control(c)),
                _ => self.reset(),
            },

            State::Osc => match ch {
                BEL | ST => {
                    self.state = State::Ground;
                    out.push(Token::Osc(std::mem::take(&mut self.buf)));
                }
                ESC => self.state = State::OscEscape,
                c => {
                    self.buf.push(c);
                    if self.buf.len() > MAX_STRING_LEN {
                        self.reset();
                    }
                }
            },

            State::OscEscape => {
                if ch == '\\' {
                    self.state = State::Ground;
                    out.push(Token::Osc(std::mem::take(&mut self.buf)));
                } else {
                    // An unterminated OSC is abandoned; the ESC starts a new sequence.
                    self.begin(State::Escape);
                    self.advance(ch, out);
                }
            }

            State::Str => match ch {
                BEL | ST => self.state = State::Ground,
                ESC => self.state = State::StrEscape,
                _ => {}
            },

            State::StrEscape => {
                if ch == '\\' {
                    self.state = State::Ground;
                } else {
                    self.begin(State::Escape);
                    self.advance(ch, out);
                }
            }
        }
    }

    fn begin(&mut self, state: State) {
        self.state = state;
        self.buf.clear();
    }

    fn finish_csi(&mut self, final_char: char) -> Csi {
        let body = std::mem::take(&mut self.buf);
        let split = body.find(|c: char| (' '..='/').contains(&c)).unwrap_or(body.len());
        let (params, intermediates) = body.split_at(split);

        Csi {
            raw: format!("\x1b[{}{}", body, final_char),
            params: params.to_string(),
            intermediates: intermediates.to_string(),
            final_char,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(chunks: &[&str]) -> Vec<Token> {
        let mut scanner = AnsiScanner::new();
        let mut out = Vec::new();
        for chunk in chunks {
            scanner.scan(chunk, &mut out);
        }
        out
    }

    fn csi(tokens: &[Token]) -> Vec<&Csi> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Csi(csi) => Some(csi),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_sgr_is_recognized_and_raw_preserved() {
        let tokens = scan(&["\x1b[1;31mred\x1b[0m"]);
        let seqs = csi(&tokens);

        assert_eq!(seqs.len(), 2);
        assert!(seqs[0].is_sgr());
        assert_eq!(seqs[0].raw, "\x1b[1;31m");
        assert_eq!(seqs[0].params, "1;31");
        assert_eq!(tokens[1], Token::Text('r'));
    }

    #[test]
    fn test_private_mode_m_is_not_sgr() {
        let tokens = scan(&["\x1b[>4;1m"]);
        assert!(!csi(&tokens)[0].is_sgr());
    }

    #[test]
    fn test_csi_split_across_chunks() {
        let tokens = scan(&["a\x1b[", "2", "K"]);

        assert_eq!(tokens[0], Token::Text('a'));
        let seq = csi(&tokens)[0];
        assert_eq!(seq.final_char, 'K');
        assert_eq!(seq.param(0, 0), 2);
    }

    #[test]
    fn test_osc_with_bel_and_st_terminators() {
        let tokens = scan(&["\x1b]133;A\x07$ \x1b]0;title\x1b\\"]);

        assert_eq!(tokens[0], Token::Osc("133;A".to_string()));
        assert_eq!(tokens[1], Token::Text('$'));
        assert_eq!(tokens[2], Token::Text(' '));
        assert_eq!(tokens[3], Token::Osc("0;title".to_string()));
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_charset_and_keypad_escapes_are_noise() {
        let tokens = scan(&["\x1b(B\x1b=x"]);
        assert_eq!(tokens, vec![Token::Escape, Token::Escape, Token::Text('x')]);
    }

    #[test]
    fn test_dcs_string_is_discarded() {
        let tokens = scan(&["\x1bP1$r0m\x1b\\ok"]);
        assert_eq!(tokens, vec![Token::Text('o'), Token::Text('k')]);
    }

    #[test]
    fn test_controls_pass_through() {
        let tokens = scan(&["a\r\n"]);
        assert_eq!(
            tokens,
            vec![Token::Text('a'), Token::Control('\r'), Token::Control('\n')]
        );
    }

    #[test]
    fn test_param_defaults() {
        let tokens = scan(&["\x1b[C\x1b[0D\x1b[5G"]);
        let seqs = csi(&tokens);

        assert_eq!(seqs[0].param(0, 1), 1);
        assert_eq!(seqs[1].param(0, 1), 1);
        assert_eq!(seqs[2].param(0, 1), 5);
    }
}
