use super::term::{Process, Value};
use miette::{SourceOffset, SourceSpan};
use std::sync::Arc;
use winnow::{
    ascii::multispace1,
    combinator::{alt, cut_err, delimited, eof, not, opt, preceded, repeat, separated, terminated},
    error::{ContextError, ErrMode, StrContext, StrContextValue},
    token::{one_of, take_till, take_while},
    ModalResult, Parser,
};

const KEYWORDS: [&str; 4] = ["tau", "restrict", "new", "in"];

type Term = Arc<Process<String>>;

#[derive(Debug, Clone, miette::Diagnostic)]
#[diagnostic(severity(Error))]
pub struct SyntaxError {
    #[label]
    span: SourceSpan,
    #[help]
    help: String,
}

impl SyntaxError {
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

impl core::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        "Syntax error.".fmt(f)
    }
}

impl core::error::Error for SyntaxError {}

pub fn set_miette_hook() {
    _ = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .color(false)
                .build(),
        )
    }));
}

pub fn parse_process(source: &str) -> Result<Term, SyntaxError> {
    terminated(
        process,
        (
            skip,
            eof.context(StrContext::Expected(StrContextValue::Description(
                "end of input",
            ))),
        ),
    )
    .parse(source)
    .map_err(|error| SyntaxError {
        span: SourceSpan::new(SourceOffset::from(error.offset()), 0),
        help: error.inner().to_string(),
    })
}

/// Whitespace and `//` line comments.
fn skip(input: &mut &str) -> ModalResult<()> {
    repeat(
        0..,
        alt((multispace1.void(), ("//", take_till(0.., '\n')).void())),
    )
    .parse_next(input)
}

fn t<'s>(token: &'static str) -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    preceded(skip, token).context(StrContext::Expected(StrContextValue::StringLiteral(token)))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

fn keyword<'s>(word: &'static str) -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    terminated(t(word), not(one_of(is_name_char)))
}

fn name(input: &mut &str) -> ModalResult<String> {
    preceded(
        skip,
        (
            one_of(|c: char| c.is_alphabetic() || c == '_'),
            take_while(0.., is_name_char),
        )
            .take()
            .verify(|name: &str| !KEYWORDS.contains(&name)),
    )
    .map(str::to_owned)
    .context(StrContext::Label("name"))
    .parse_next(input)
}

fn process(input: &mut &str) -> ModalResult<Term> {
    separated(1.., sum, t("|"))
        .map(|mut components: Vec<Term>| match components.len() {
            1 => components.remove(0),
            _ => Arc::new(Process::parallel(components)),
        })
        .parse_next(input)
}

fn sum(input: &mut &str) -> ModalResult<Term> {
    separated(1.., prefix, t("+"))
        .verify_map(|mut branches: Vec<Term>| match branches.len() {
            1 => Some(branches.remove(0)),
            _ => Process::sum(branches).ok().map(Arc::new),
        })
        .parse_next(input)
}

fn prefix(input: &mut &str) -> ModalResult<Term> {
    alt((
        t("0").map(|_| Arc::new(Process::nil())),
        preceded(keyword("tau"), continuation).map(|then| Arc::new(Process::Silent(then))),
        preceded(t("!"), cut_err(prefix)).map(|body| Arc::new(Process::Replication(body))),
        restriction,
        delimited(t("("), cut_err(process), cut_err(t(")"))),
        action,
    ))
    .context(StrContext::Label("process"))
    .parse_next(input)
}

/// `.P`, or nothing for `0`.
fn continuation(input: &mut &str) -> ModalResult<Term> {
    opt(preceded(t("."), cut_err(prefix)))
        .map(|then| then.unwrap_or_else(|| Arc::new(Process::nil())))
        .parse_next(input)
}

fn restriction(input: &mut &str) -> ModalResult<Term> {
    preceded(
        alt((keyword("restrict"), keyword("new"))),
        cut_err((separated(1.., name, t(",")), keyword("in"), prefix)),
    )
    .map(|(bound, _, body): (Vec<String>, _, Term)| {
        bound
            .into_iter()
            .rev()
            .fold(body, |body, bound| Arc::new(Process::Restriction { bound, body }))
    })
    .parse_next(input)
}

fn action(input: &mut &str) -> ModalResult<Term> {
    let channel = name.parse_next(input)?;
    let parsed = alt((
        (
            delimited(
                t("<"),
                cut_err(separated(0.., value, t(","))),
                cut_err(t(">")),
            ),
            continuation,
        )
            .map(|(values, then)| Arc::new(Process::send(channel.clone(), values, then))),
        (
            delimited(t("("), cut_err(binders), cut_err(t(")"))),
            continuation,
        )
            .verify_map(|(bound, then)| {
                Process::receive(channel.clone(), bound, then).ok().map(Arc::new)
            }),
    ))
    .context(StrContext::Expected(StrContextValue::CharLiteral('<')))
    .context(StrContext::Expected(StrContextValue::CharLiteral('(')))
    .parse_next(input);
    parsed
}

fn binders(input: &mut &str) -> ModalResult<Vec<String>> {
    separated(0.., name, t(","))
        .verify(|bound: &Vec<String>| {
            bound
                .iter()
                .enumerate()
                .all(|(i, name)| !bound[i + 1..].contains(name))
        })
        .context(StrContext::Label("pairwise distinct bound names"))
        .parse_next(input)
}

fn value(input: &mut &str) -> ModalResult<Arc<Value<String>>> {
    alt((
        preceded(t("\\"), cut_err((name, t("."), value)))
            .map(|(bound, _, body)| Arc::new(Value::Abstraction(bound, body))),
        application,
    ))
    .context(StrContext::Label("value"))
    .parse_next(input)
}

fn application(input: &mut &str) -> ModalResult<Arc<Value<String>>> {
    let function = atom.parse_next(input)?;
    let arguments: Vec<_> = repeat(0.., atom).parse_next(input)?;
    Ok(arguments
        .into_iter()
        .fold(function, |function, argument| {
            Arc::new(Value::Application(function, argument))
        }))
}

fn atom(input: &mut &str) -> ModalResult<Arc<Value<String>>> {
    alt((
        name.map(|name| Arc::new(Value::Var(name))),
        delimited(t("("), cut_err(value), cut_err(t(")"))),
    ))
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pi::show::{Plain, Showable};

    fn reprint(source: &str) -> String {
        let term = parse_process(source).unwrap();
        Showable(term.as_ref(), &Plain).to_string()
    }

    #[test]
    fn precedence_of_sum_and_parallel() {
        assert_eq!(reprint("a<>.0 + b().0 | c<x>"), "((a<>.0 + b().0) | c<x>.0)");
        assert_eq!(reprint("a<> + (b() | c<x>)"), "(a<>.0 + (b().0 | c<x>.0))");
    }

    #[test]
    fn prefixes() {
        assert_eq!(reprint("tau.tau"), "tau.tau.0");
        assert_eq!(reprint("!a(x, y).x<y>.0"), "!a(x, y).x<y>.0");
        assert_eq!(reprint("new a, b in a<b>"), "restrict a in restrict b in a<b>.0");
    }

    #[test]
    fn values() {
        assert_eq!(reprint(r"a<\x.x, f g h, f (g h)>"), r"a<\x.x, f g h, f (g h)>.0");
        assert_eq!(reprint(r"a<(\x.x) y>"), r"a<(\x.x) y>.0");
    }

    #[test]
    fn comments_and_primes() {
        let source = "// a comment\nrestrict c' in c'<> // trailing\n| c'()";
        assert_eq!(reprint(source), "(restrict c' in c'<>.0 | c'().0)");
    }

    #[test]
    fn keywords_are_not_names() {
        assert!(parse_process("in<>").is_err());
        assert_eq!(reprint("tau1<> | input()"), "(tau1<>.0 | input().0)");
    }

    #[test]
    fn syntax_errors_point_at_the_problem() {
        let error = parse_process("a<x.0").unwrap_err();
        assert_eq!(error.offset(), 3);
        assert!(parse_process("a<> |").is_err());
        assert!(parse_process("a(x, x).0").is_err());
        assert!(parse_process("").is_err());
    }
}
