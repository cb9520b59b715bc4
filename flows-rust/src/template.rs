//! Mustache-style prompt templates.
//!
//! A template is parsed once into a node tree and rendered against any
//! `Serialize` record. Supported tags:
//!
//! - `{{field}}` and dotted paths such as `{{course.title}}`
//! - `{{#if field}} ... {{else}} ... {{/if}}`
//! - `{{#each items}} ... {{/each}}`, with `{{this}}` bound to the element and
//!   `{{@index}}` to its zero-based position
//! - `{{! comment }}`
//!
//! Substitution is verbatim. A placeholder that resolves to nothing fails the
//! render instead of producing an empty string.
use crate::{errors::TemplateError, schema::ObjectSchema};
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeSet, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    raw: String,
    segments: Vec<String>,
}

impl Path {
    fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw.split('.').map(str::to_string).collect(),
        }
    }

    /// The root-level field this path reads, if it is not relative to an
    /// `#each` element.
    fn root_field(&self) -> Option<&str> {
        match self.segments.first().map(String::as_str) {
            Some("this" | "@index") | None => None,
            Some(field) => Some(field),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Placeholder(Path),
    If {
        path: Path,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Each {
        path: Path,
        body: Vec<Node>,
    },
}

enum BlockKind {
    If,
    Each,
}

impl BlockKind {
    fn name(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Each => "each",
        }
    }
}

/// A block whose closing tag has not been seen yet.
struct OpenBlock {
    kind: BlockKind,
    path: Path,
    then: Vec<Node>,
    otherwise: Vec<Node>,
    in_else: bool,
}

impl OpenBlock {
    fn sink(&mut self) -> &mut Vec<Node> {
        if self.in_else {
            &mut self.otherwise
        } else {
            &mut self.then
        }
    }

    fn close(self) -> Node {
        match self.kind {
            BlockKind::If => Node::If {
                path: self.path,
                then: self.then,
                otherwise: self.otherwise,
            },
            BlockKind::Each => Node::Each {
                path: self.path,
                body: self.then,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    nodes: Vec<Node>,
}

impl PromptTemplate {
    /// Parse a template. Unterminated tags, unknown block helpers and
    /// unbalanced blocks are rejected here rather than at render time.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut root: Vec<Node> = Vec::new();
        let mut open: Vec<OpenBlock> = Vec::new();

        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                push_node(&mut root, &mut open, Node::Text(rest[..start].to_string()));
            }

            let after_open = &rest[start + 2..];
            let end = after_open
                .find("}}")
                .ok_or(TemplateError::UnterminatedTag(offset + start))?;
            let tag = after_open[..end].trim();
            if tag.is_empty() {
                return Err(TemplateError::EmptyTag(offset + start));
            }

            if let Some(block) = tag.strip_prefix('#') {
                let (helper, argument) = block
                    .split_once(char::is_whitespace)
                    .map_or((block, ""), |(helper, argument)| (helper, argument.trim()));
                let kind = match helper {
                    "if" => BlockKind::If,
                    "each" => BlockKind::Each,
                    other => return Err(TemplateError::UnknownHelper(other.to_string())),
                };
                if argument.is_empty() {
                    return Err(TemplateError::EmptyTag(offset + start));
                }
                open.push(OpenBlock {
                    kind,
                    path: Path::parse(argument),
                    then: Vec::new(),
                    otherwise: Vec::new(),
                    in_else: false,
                });
            } else if let Some(closing) = tag.strip_prefix('/') {
                let closing = closing.trim();
                match open.last() {
                    Some(block) if block.kind.name() == closing => {}
                    _ => return Err(TemplateError::UnexpectedTag(tag.to_string())),
                }
                if let Some(block) = open.pop() {
                    push_node(&mut root, &mut open, block.close());
                }
            } else if tag == "else" {
                match open.last_mut() {
                    Some(block) if matches!(block.kind, BlockKind::If) && !block.in_else => {
                        block.in_else = true;
                    }
                    _ => return Err(TemplateError::UnexpectedTag(tag.to_string())),
                }
            } else if !tag.starts_with('!') {
                push_node(&mut root, &mut open, Node::Placeholder(Path::parse(tag)));
            }

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            push_node(&mut root, &mut open, Node::Text(rest.to_string()));
        }

        if let Some(block) = open.pop() {
            return Err(TemplateError::UnclosedBlock(block.kind.name().to_string()));
        }

        Ok(Self { nodes: root })
    }

    /// Parse a template and check that every root-level field it reads is
    /// declared by `schema`.
    pub fn parse_for(source: &str, schema: &ObjectSchema) -> Result<Self, TemplateError> {
        let template = Self::parse(source)?;
        if let Some(field) = template
            .referenced_fields()
            .into_iter()
            .find(|field| schema.field(field).is_none())
        {
            return Err(TemplateError::UnknownField {
                schema: schema.name.to_string(),
                field: field.to_string(),
            });
        }
        Ok(template)
    }

    /// Root-level fields read by placeholders, conditionals and loops.
    /// Paths inside `#each` bodies are resolved against the element first and
    /// are not included.
    #[must_use]
    pub fn referenced_fields(&self) -> BTreeSet<&str> {
        let mut fields = BTreeSet::new();
        collect_root_fields(&self.nodes, &mut fields);
        fields
    }

    pub fn render<T: Serialize + ?Sized>(&self, input: &T) -> Result<String, TemplateError> {
        let value =
            serde_json::to_value(input).map_err(|error| TemplateError::Bind(error.to_string()))?;
        self.render_value(&value)
    }

    pub fn render_value(&self, input: &Value) -> Result<String, TemplateError> {
        let scope = Scope {
            value: input,
            index: None,
            parent: None,
        };
        let mut output = String::new();
        render_nodes(&self.nodes, &scope, &mut output)?;
        Ok(output)
    }
}

impl FromStr for PromptTemplate {
    type Err = TemplateError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source)
    }
}

fn push_node(root: &mut Vec<Node>, open: &mut [OpenBlock], node: Node) {
    match open.last_mut() {
        Some(block) => block.sink().push(node),
        None => root.push(node),
    }
}

fn collect_root_fields<'a>(nodes: &'a [Node], fields: &mut BTreeSet<&'a str>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Placeholder(path) => fields.extend(path.root_field()),
            Node::If {
                path,
                then,
                otherwise,
            } => {
                fields.extend(path.root_field());
                collect_root_fields(then, fields);
                collect_root_fields(otherwise, fields);
            }
            Node::Each { path, .. } => fields.extend(path.root_field()),
        }
    }
}

/// One level of the render context. `#each` pushes a scope per element.
struct Scope<'a> {
    value: &'a Value,
    index: Option<usize>,
    parent: Option<&'a Scope<'a>>,
}

enum Resolved<'a> {
    Value(&'a Value),
    Index(usize),
}

fn walk<'a>(mut value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    for segment in segments {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn resolve<'a>(scope: &Scope<'a>, path: &Path) -> Option<Resolved<'a>> {
    match path.segments.first().map(String::as_str) {
        Some("@index") => {
            let mut current = Some(scope);
            while let Some(level) = current {
                if let Some(index) = level.index {
                    return Some(Resolved::Index(index));
                }
                current = level.parent;
            }
            None
        }
        Some("this") => walk(scope.value, &path.segments[1..]).map(Resolved::Value),
        _ => {
            // Innermost scope wins, then enclosing ones up to the root record.
            if let Some(value) = walk(scope.value, &path.segments) {
                return Some(Resolved::Value(value));
            }
            let mut current = scope.parent;
            while let Some(level) = current {
                if let Some(value) = walk(level.value, &path.segments) {
                    return Some(Resolved::Value(value));
                }
                current = level.parent;
            }
            None
        }
    }
}

fn is_truthy(resolved: Option<&Resolved<'_>>) -> bool {
    match resolved {
        None | Some(Resolved::Value(Value::Null)) => false,
        Some(Resolved::Index(_)) => true,
        Some(Resolved::Value(Value::Bool(value))) => *value,
        Some(Resolved::Value(Value::Number(number))) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Resolved::Value(Value::String(text))) => !text.is_empty(),
        Some(Resolved::Value(Value::Array(items))) => !items.is_empty(),
        Some(Resolved::Value(Value::Object(map))) => !map.is_empty(),
    }
}

fn render_nodes(nodes: &[Node], scope: &Scope<'_>, output: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => output.push_str(text),
            Node::Placeholder(path) => match resolve(scope, path) {
                Some(Resolved::Index(index)) => output.push_str(&index.to_string()),
                Some(Resolved::Value(Value::String(text))) => output.push_str(text),
                Some(Resolved::Value(Value::Null)) | None => {
                    return Err(TemplateError::UnresolvedPlaceholder(path.raw.clone()));
                }
                Some(Resolved::Value(value)) => output.push_str(&value.to_string()),
            },
            Node::If {
                path,
                then,
                otherwise,
            } => {
                let branch = if is_truthy(resolve(scope, path).as_ref()) {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, scope, output)?;
            }
            Node::Each { path, body } => {
                let items = match resolve(scope, path) {
                    Some(Resolved::Value(Value::Array(items))) => items,
                    Some(Resolved::Value(Value::Null)) | None => {
                        return Err(TemplateError::UnresolvedPlaceholder(path.raw.clone()));
                    }
                    Some(_) => return Err(TemplateError::NotIterable(path.raw.clone())),
                };
                for (index, item) in items.iter().enumerate() {
                    let element = Scope {
                        value: item,
                        index: Some(index),
                        parent: Some(scope),
                    };
                    render_nodes(body, &element, output)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, ObjectSchema};
    use serde_json::json;

    #[test]
    fn substitutes_fields_and_dotted_paths() {
        let template = PromptTemplate::parse("Course {{course.title}} ({{level}})").unwrap();
        let output = template
            .render(&json!({ "course": { "title": "Rust 101" }, "level": 2 }))
            .unwrap();
        assert_eq!(output, "Course Rust 101 (2)");
    }

    #[test]
    fn substitution_is_verbatim() {
        let template = PromptTemplate::parse("<code>{{snippet}}</code>").unwrap();
        let output = template
            .render(&json!({ "snippet": "if a < b && c > d { \"x\" }" }))
            .unwrap();
        assert_eq!(output, "<code>if a < b && c > d { \"x\" }</code>");
    }

    #[test]
    fn unresolved_placeholder_fails() {
        let template = PromptTemplate::parse("Explain {{codeSnipet}}").unwrap();
        let error = template
            .render(&json!({ "codeSnippet": "fn main() {}" }))
            .unwrap_err();
        assert_eq!(
            error,
            TemplateError::UnresolvedPlaceholder("codeSnipet".to_string())
        );
    }

    #[test]
    fn null_placeholder_fails() {
        let template = PromptTemplate::parse("{{userCode}}").unwrap();
        let error = template.render(&json!({ "userCode": null })).unwrap_err();
        assert!(matches!(error, TemplateError::UnresolvedPlaceholder(_)));
    }

    #[test]
    fn if_else_follows_truthiness() {
        let template =
            PromptTemplate::parse("{{#if userCode}}Code: {{userCode}}{{else}}No code{{/if}}")
                .unwrap();

        assert_eq!(
            template.render(&json!({ "userCode": "x = 1" })).unwrap(),
            "Code: x = 1"
        );
        assert_eq!(template.render(&json!({ "userCode": "" })).unwrap(), "No code");
        assert_eq!(template.render(&json!({})).unwrap(), "No code");
        assert_eq!(template.render(&json!({ "userCode": [] })).unwrap(), "No code");
        assert_eq!(template.render(&json!({ "userCode": 0 })).unwrap(), "No code");
    }

    #[test]
    fn each_binds_this_and_index() {
        let template =
            PromptTemplate::parse("{{#each snippets}}{{@index}}. {{this}}\n{{/each}}").unwrap();
        let output = template
            .render(&json!({ "snippets": ["let", "mut", "fn"] }))
            .unwrap();
        assert_eq!(output, "0. let\n1. mut\n2. fn\n");
    }

    #[test]
    fn each_resolves_element_fields_then_outer_scope() {
        let template = PromptTemplate::parse(
            "{{#each questions}}[{{language}}] {{question}} -> {{this.answer}}\n{{/each}}",
        )
        .unwrap();
        let output = template
            .render(&json!({
                "language": "rust",
                "questions": [
                    { "question": "a?", "answer": "1" },
                    { "question": "b?", "answer": "2" }
                ]
            }))
            .unwrap();
        assert_eq!(output, "[rust] a? -> 1\n[rust] b? -> 2\n");
    }

    #[test]
    fn each_over_non_array_fails() {
        let template = PromptTemplate::parse("{{#each title}}{{this}}{{/each}}").unwrap();
        let error = template.render(&json!({ "title": "x" })).unwrap_err();
        assert_eq!(error, TemplateError::NotIterable("title".to_string()));
    }

    #[test]
    fn comments_render_nothing() {
        let template = PromptTemplate::parse("a{{! ignored }}b").unwrap();
        assert_eq!(template.render(&json!({})).unwrap(), "ab");
    }

    #[test]
    fn unbalanced_tags_fail_at_parse_time() {
        assert_eq!(
            PromptTemplate::parse("{{#if a}}x").unwrap_err(),
            TemplateError::UnclosedBlock("if".to_string())
        );
        assert_eq!(
            PromptTemplate::parse("{{#each a}}x{{/if}}").unwrap_err(),
            TemplateError::UnexpectedTag("/if".to_string())
        );
        assert_eq!(
            PromptTemplate::parse("x{{/each}}").unwrap_err(),
            TemplateError::UnexpectedTag("/each".to_string())
        );
        assert_eq!(
            PromptTemplate::parse("{{else}}").unwrap_err(),
            TemplateError::UnexpectedTag("else".to_string())
        );
        assert_eq!(
            PromptTemplate::parse("{{#with a}}{{/with}}").unwrap_err(),
            TemplateError::UnknownHelper("with".to_string())
        );
        assert_eq!(
            PromptTemplate::parse("ab{{name").unwrap_err(),
            TemplateError::UnterminatedTag(2)
        );
    }

    #[test]
    fn parse_for_rejects_undeclared_fields() {
        let schema = ObjectSchema::new(
            "HintInput",
            "",
            vec![
                Field::string("problemStatement", ""),
                Field::string("userCode", "").optional(),
            ],
        );

        assert!(PromptTemplate::parse_for(
            "{{problemStatement}}{{#if userCode}}{{userCode}}{{/if}}",
            &schema
        )
        .is_ok());

        assert_eq!(
            PromptTemplate::parse_for("{{problem}}", &schema).unwrap_err(),
            TemplateError::UnknownField {
                schema: "HintInput".to_string(),
                field: "problem".to_string(),
            }
        );
    }
}
