//! The built-in markup renderer.
//!
//! A small FreeMarker-flavored syntax covering what the engine needs from
//! a synchronous renderer:
//!
//! - `${path}` interpolates a bound value, dotted paths descend into
//!   objects and arrays
//! - `<#if path>...<#else>...</#if>` branches on a boolean binding; a
//!   leading `!` negates the condition
//! - `<@include "name"/>` splices a rendered dependency; `required=false`
//!   makes absence harmless
//! - `<@import "name" as alias/>` binds a dependency namespace for the
//!   rest of the pass
//!
//! Source is parsed into nodes first and evaluated second, so parse
//! errors carry line numbers no matter where evaluation stops.
//! Dereferencing an unbound or null path raises
//! [`RenderError::UnresolvedReference`], the recoverable signal the
//! engine turns into a fetch-and-retry.

use std::collections::HashMap;

use serde_json::Value;

use crate::bindings::{Bindings, descend};
use crate::error::RenderError;
use crate::key::TemplateKey;
use crate::render::{
    DirectiveCall, DirectiveHost, DirectiveKind, DirectiveOutcome, TemplateRenderer,
};

const IF_OPEN: &str = "<#if";
const ELSE_TAG: &str = "<#else>";
const IF_CLOSE: &str = "</#if>";

/// The built-in [`TemplateRenderer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupRenderer;

impl TemplateRenderer for MarkupRenderer {
    fn render(
        &self,
        _key: &TemplateKey,
        source: &str,
        bindings: &Bindings,
        host: &dyn DirectiveHost,
    ) -> Result<String, RenderError> {
        let nodes = Parser::new(source).parse()?;
        let mut scope = Scope::new(bindings);
        let mut output = String::new();
        eval_nodes(&nodes, &mut scope, host, &mut output)?;
        Ok(output)
    }
}

#[derive(Debug)]
enum Node {
    Text(String),
    Interpolation {
        path: String,
    },
    Conditional {
        path: String,
        negated: bool,
        line: usize,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    Directive {
        call: DirectiveCall,
    },
}

/// What terminated a block of nodes.
enum BlockEnd {
    Eof,
    Else { line: usize },
    EndIf { line: usize },
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn parse(mut self) -> Result<Vec<Node>, RenderError> {
        let (nodes, end) = self.parse_block()?;
        match end {
            BlockEnd::Eof => Ok(nodes),
            BlockEnd::Else { line } => Err(parse_error(line, "<#else> outside <#if>")),
            BlockEnd::EndIf { line } => Err(parse_error(line, "</#if> without matching <#if>")),
        }
    }

    fn line_at(&self, pos: usize) -> usize {
        self.source[..pos].bytes().filter(|b| *b == b'\n').count() + 1
    }

    fn parse_block(&mut self) -> Result<(Vec<Node>, BlockEnd), RenderError> {
        let mut nodes = Vec::new();
        while self.pos < self.source.len() {
            let rest = &self.source[self.pos..];
            let Some(offset) = find_marker(rest) else {
                nodes.push(Node::Text(rest.to_string()));
                self.pos = self.source.len();
                break;
            };
            if offset > 0 {
                nodes.push(Node::Text(rest[..offset].to_string()));
                self.pos += offset;
            }
            let rest = &self.source[self.pos..];
            let line = self.line_at(self.pos);
            if rest.starts_with("${") {
                nodes.push(self.parse_interpolation(line)?);
            } else if rest.starts_with(ELSE_TAG) {
                self.pos += ELSE_TAG.len();
                return Ok((nodes, BlockEnd::Else { line }));
            } else if rest.starts_with(IF_CLOSE) {
                self.pos += IF_CLOSE.len();
                return Ok((nodes, BlockEnd::EndIf { line }));
            } else if rest.starts_with(IF_OPEN) {
                nodes.push(self.parse_conditional(line)?);
            } else if rest.starts_with("<@") {
                nodes.push(self.parse_directive(line)?);
            } else {
                return Err(parse_error(
                    line,
                    format!("unknown tag {:?}", snippet(rest)),
                ));
            }
        }
        Ok((nodes, BlockEnd::Eof))
    }

    fn parse_interpolation(&mut self, line: usize) -> Result<Node, RenderError> {
        let rest = &self.source[self.pos..];
        let close = rest
            .find('}')
            .ok_or_else(|| parse_error(line, "unterminated interpolation"))?;
        let path = rest[2..close].trim();
        if !is_path(path) {
            return Err(parse_error(
                line,
                format!("invalid interpolation path {path:?}"),
            ));
        }
        self.pos += close + 1;
        Ok(Node::Interpolation {
            path: path.to_string(),
        })
    }

    fn parse_conditional(&mut self, line: usize) -> Result<Node, RenderError> {
        let rest = &self.source[self.pos..];
        if !rest[IF_OPEN.len()..].starts_with(char::is_whitespace) {
            return Err(parse_error(line, format!("unknown tag {:?}", snippet(rest))));
        }
        let close = rest
            .find('>')
            .ok_or_else(|| parse_error(line, "unterminated <#if tag"))?;
        let condition = rest[IF_OPEN.len()..close].trim();
        let (negated, path) = match condition.strip_prefix('!') {
            Some(stripped) => (true, stripped.trim_start()),
            None => (false, condition),
        };
        if !is_path(path) {
            return Err(parse_error(line, format!("invalid condition {condition:?}")));
        }
        self.pos += close + 1;

        let (then_branch, first_end) = self.parse_block()?;
        let (else_branch, last_end) = match first_end {
            BlockEnd::Else { .. } => self.parse_block()?,
            other => (Vec::new(), other),
        };
        match last_end {
            BlockEnd::EndIf { .. } => Ok(Node::Conditional {
                path: path.to_string(),
                negated,
                line,
                then_branch,
                else_branch,
            }),
            BlockEnd::Else { line } => Err(parse_error(line, "duplicate <#else>")),
            BlockEnd::Eof => Err(parse_error(line, "unterminated <#if>, missing </#if>")),
        }
    }

    fn parse_directive(&mut self, line: usize) -> Result<Node, RenderError> {
        let rest = &self.source[self.pos..];
        let close = rest
            .find("/>")
            .ok_or_else(|| parse_error(line, "unterminated directive"))?;
        let inside = rest[2..close].trim();
        self.pos += close + 2;
        let call = parse_directive_call(inside, line)?;
        Ok(Node::Directive { call })
    }
}

/// Byte offset of the earliest markup marker, if any.
fn find_marker(text: &str) -> Option<usize> {
    ["${", "<#", "</#", "<@"]
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
}

fn is_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

fn snippet(text: &str) -> String {
    text.chars().take_while(|c| *c != '\n').take(12).collect()
}

fn parse_error(line: usize, message: impl Into<String>) -> RenderError {
    RenderError::Parse {
        message: message.into(),
        line,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DirectiveToken {
    Word(String),
    Quoted(String),
}

impl DirectiveToken {
    fn text(&self) -> &str {
        match self {
            Self::Word(word) => word,
            Self::Quoted(quoted) => quoted,
        }
    }
}

fn tokenize_directive(inside: &str, line: usize) -> Result<Vec<DirectiveToken>, RenderError> {
    let mut tokens = Vec::new();
    let mut rest = inside.trim_start();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('"') {
            let close = after
                .find('"')
                .ok_or_else(|| parse_error(line, "unterminated quoted string"))?;
            tokens.push(DirectiveToken::Quoted(after[..close].to_string()));
            rest = after[close + 1..].trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tokens.push(DirectiveToken::Word(rest[..end].to_string()));
            rest = rest[end..].trim_start();
        }
    }
    Ok(tokens)
}

fn parse_directive_call(inside: &str, line: usize) -> Result<DirectiveCall, RenderError> {
    let mut tokens = tokenize_directive(inside, line)?.into_iter();
    let kind = match tokens.next() {
        Some(DirectiveToken::Word(word)) if word == "include" => DirectiveKind::Include,
        Some(DirectiveToken::Word(word)) if word == "import" => DirectiveKind::Import,
        Some(token) => {
            return Err(parse_error(
                line,
                format!("unknown directive {:?}", token.text()),
            ));
        }
        None => return Err(parse_error(line, "empty directive")),
    };
    let name = match tokens.next() {
        Some(DirectiveToken::Quoted(name)) => name,
        _ => return Err(parse_error(line, "directive needs a quoted template name")),
    };
    let mut call = match kind {
        DirectiveKind::Include => DirectiveCall::include(name),
        DirectiveKind::Import => DirectiveCall::import(name),
    };
    while let Some(token) = tokens.next() {
        match &token {
            DirectiveToken::Word(word) if word == "as" => {
                if call.kind == DirectiveKind::Include {
                    return Err(parse_error(line, "`as` is only valid on import"));
                }
                let Some(DirectiveToken::Word(alias)) = tokens.next() else {
                    return Err(parse_error(line, "expected alias after `as`"));
                };
                call = call.with_alias(alias);
            }
            DirectiveToken::Word(word) if word == "required=true" => call.required = true,
            DirectiveToken::Word(word) if word == "required=false" => call.required = false,
            other => {
                return Err(parse_error(
                    line,
                    format!("unexpected token {:?} in directive", other.text()),
                ));
            }
        }
    }
    Ok(call)
}

/// Variable scope for one pass: the caller's bindings plus namespaces
/// bound by imports. A namespace shadows a binding with the same name.
struct Scope<'a> {
    bindings: &'a Bindings,
    namespaces: HashMap<String, Value>,
}

impl<'a> Scope<'a> {
    fn new(bindings: &'a Bindings) -> Self {
        Self {
            bindings,
            namespaces: HashMap::new(),
        }
    }

    fn bind(&mut self, alias: String, value: Value) {
        self.namespaces.insert(alias, value);
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        if let Some(namespace) = self.namespaces.get(head) {
            return match rest {
                Some(rest) => descend(namespace, rest),
                None => Some(namespace),
            };
        }
        self.bindings.get(path)
    }
}

fn eval_nodes(
    nodes: &[Node],
    scope: &mut Scope<'_>,
    host: &dyn DirectiveHost,
    output: &mut String,
) -> Result<(), RenderError> {
    for node in nodes {
        match node {
            Node::Text(text) => output.push_str(text),
            Node::Interpolation { path } => match scope.lookup(path) {
                None | Some(Value::Null) => {
                    return Err(RenderError::UnresolvedReference { name: path.clone() });
                }
                Some(Value::String(text)) => output.push_str(text),
                Some(Value::Number(number)) => output.push_str(&number.to_string()),
                Some(Value::Bool(value)) => output.push_str(if *value { "true" } else { "false" }),
                Some(_) => {
                    return Err(RenderError::Eval {
                        message: format!("cannot interpolate composite value {path:?}"),
                    });
                }
            },
            Node::Conditional {
                path,
                negated,
                line,
                then_branch,
                else_branch,
            } => {
                let truthy = match scope.lookup(path) {
                    None | Some(Value::Null) => {
                        return Err(RenderError::UnresolvedReference { name: path.clone() });
                    }
                    Some(Value::Bool(value)) => *value,
                    Some(_) => {
                        return Err(RenderError::Eval {
                            message: format!("condition {path:?} at line {line} is not a boolean"),
                        });
                    }
                };
                let branch = if truthy != *negated {
                    then_branch
                } else {
                    else_branch
                };
                eval_nodes(branch, scope, host, output)?;
            }
            Node::Directive { call } => match host.directive(call.clone())? {
                DirectiveOutcome::Spliced(content) => output.push_str(&content),
                DirectiveOutcome::Bound { alias, value } => scope.bind(alias, value),
                DirectiveOutcome::Pending => {}
            },
        }
    }
    Ok(())
}
