//! Conditional expressions over versions, variants and dependencies
//!
//! Recipes guard dependencies, patches, conflicts and variants with `when`
//! conditions. This module parses the compact constraint syntax used by recipes into
//! a tagged condition tree and evaluates it against a concrete selection.
//!
//! # Syntax
//!
//! - Version range of the package itself: `@1.26:`, `@:1.23`, `@1.19:1.23`
//! - Boolean variant: `+hepmc3` (enabled), `~ddrec` (disabled)
//! - Valued variant: `cxxstd=17`
//! - Dependency: `^root@6.28: ~webgui`
//! - Compiler: `%gcc@:7`
//!
//! Clauses are conjoined. Sigils need no separating whitespace, so
//! `~ddrec+dddetectors` reads as two clauses. Parentheses group, `|`
//! separates alternatives and `!( ... )` negates a group:
//! `(+ddg4) | (^geant4@11:)`, `@1.20: !(+ddrec)`.

use crate::types::{CompilerSpec, DependencyState, VariantValue, Version, VersionRange};
use crate::variant::{ResolvedVariants, VariantSelection};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    /// Always holds
    Always,
    /// The package version lies in a range
    Version(VersionRange),
    /// A variant of the package has a value
    Variant { name: String, value: VariantValue },
    /// A dependency is present and satisfies a constraint
    Dependency {
        package: String,
        constraint: SpecConstraint,
    },
    /// The compiler matches a name and version range
    Compiler { name: String, versions: VersionRange },
    /// All sub-conditions hold
    All(Vec<Condition>),
    /// At least one sub-condition holds
    Any(Vec<Condition>),
    /// The sub-condition does not hold
    Not(Box<Condition>),
}

/// Version and variant constraints on a single package
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecConstraint {
    pub versions: VersionRange,
    pub variants: Vec<(String, VariantValue)>,
}

/// Everything a condition may inspect
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub version: &'a Version,
    pub variants: &'a ResolvedVariants,
    pub dependencies: &'a BTreeMap<String, DependencyState>,
    pub compiler: Option<&'a CompilerSpec>,
}

impl Condition {
    /// Parse a `when` string; the empty string means [`Condition::Always`]
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = ExprParser { input, pos: 0 };
        let condition = parser.expr()?;
        parser.skip_whitespace();
        match parser.peek() {
            None => Ok(condition),
            Some(_) => Err(parse_error(input, "unbalanced ')'")),
        }
    }

    fn from_clauses(input: &str, run: &str) -> Result<Vec<Condition>> {
        let mut conditions = Vec::new();

        for clause in parse_clauses(run)? {
            match clause {
                Clause::Root(node) => {
                    if let Some(name) = node.name {
                        return Err(parse_error(
                            input,
                            &format!("unexpected package name '{}' (use '^{}')", name, name),
                        ));
                    }
                    if let Some(versions) = node.versions {
                        conditions.push(Condition::Version(versions));
                    }
                    for (name, value) in node.variants {
                        conditions.push(Condition::Variant { name, value });
                    }
                }
                Clause::Dependency(node) => {
                    let package = node
                        .name
                        .ok_or_else(|| parse_error(input, "'^' must be followed by a package name"))?;
                    conditions.push(Condition::Dependency {
                        package,
                        constraint: SpecConstraint {
                            versions: node.versions.unwrap_or_default(),
                            variants: node.variants,
                        },
                    });
                }
                Clause::Compiler { name, versions } => {
                    conditions.push(Condition::Compiler { name, versions });
                }
            }
        }

        Ok(conditions)
    }

    fn conjunction(conditions: Vec<Condition>) -> Condition {
        let mut flat = Vec::new();
        for c in conditions {
            match c {
                Condition::Always => {}
                Condition::All(inner) => flat.extend(inner),
                c => flat.push(c),
            }
        }
        match flat.len() {
            0 => Condition::Always,
            1 => flat.remove(0),
            _ => Condition::All(flat),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Condition::Always)
    }

    /// Evaluate against a concrete selection
    ///
    /// Predicates on inactive variants or absent dependencies are false.
    /// Naming a variant the recipe never declared is an error.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        match self {
            Condition::Always => Ok(true),
            Condition::Version(range) => Ok(range.contains(ctx.version)),
            Condition::Variant { name, value } => Ok(ctx
                .variants
                .lookup(name)?
                .map(|actual| actual.matches(value))
                .unwrap_or(false)),
            Condition::Dependency {
                package,
                constraint,
            } => Ok(ctx
                .dependencies
                .get(package)
                .map(|state| constraint.satisfied_by(state))
                .unwrap_or(false)),
            Condition::Compiler { name, versions } => Ok(ctx
                .compiler
                .map(|c| &c.name == name && versions.contains(&c.version))
                .unwrap_or(false)),
            Condition::All(conditions) => {
                for c in conditions {
                    if !c.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any(conditions) => {
                for c in conditions {
                    if c.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(inner) => Ok(!inner.evaluate(ctx)?),
        }
    }

    /// Names of the package's own variants referenced by this condition
    ///
    /// Variants inside dependency clauses belong to the dependency and are
    /// not included.
    pub fn referenced_variants(&self) -> Vec<&str> {
        match self {
            Condition::Variant { name, .. } => vec![name.as_str()],
            Condition::All(cs) | Condition::Any(cs) => {
                cs.iter().flat_map(|c| c.referenced_variants()).collect()
            }
            Condition::Not(inner) => inner.referenced_variants(),
            Condition::Always
            | Condition::Version(_)
            | Condition::Dependency { .. }
            | Condition::Compiler { .. } => Vec::new(),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Always => Ok(()),
            Condition::Version(range) => write!(f, "@{}", range),
            Condition::Variant { name, value } => write!(f, "{}", format_variant(name, value)),
            Condition::Dependency {
                package,
                constraint,
            } => write!(f, "^{}{}", package, constraint),
            Condition::Compiler { name, versions } => {
                if versions.is_any() {
                    write!(f, "%{}", name)
                } else {
                    write!(f, "%{}@{}", name, versions)
                }
            }
            Condition::All(cs) => {
                // Group anything the clause parser would otherwise fold
                // into a neighbouring clause
                let mut seen_version = false;
                let parts: Vec<String> = cs
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        let group = match c {
                            Condition::Any(_) => true,
                            Condition::Dependency { .. } | Condition::Compiler { .. } => {
                                i + 1 < cs.len()
                            }
                            Condition::Version(_) => std::mem::replace(&mut seen_version, true),
                            _ => false,
                        };
                        if group {
                            format!("({})", c)
                        } else {
                            c.to_string()
                        }
                    })
                    .collect();
                write!(f, "{}", parts.join(" "))
            }
            Condition::Any(cs) => {
                let parts: Vec<String> = cs.iter().map(|c| format!("({})", c)).collect();
                write!(f, "{}", parts.join(" | "))
            }
            Condition::Not(inner) => write!(f, "!({})", inner),
        }
    }
}

impl TryFrom<String> for Condition {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Condition::parse(&s)
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.to_string()
    }
}

impl SpecConstraint {
    /// Parse a dependency declaration such as `root@6.08: +gdml +math`
    pub fn parse_named(input: &str) -> Result<(String, Self)> {
        let mut clauses = parse_clauses(input)?;
        if clauses.len() != 1 {
            return Err(parse_error(input, "expected a single package clause"));
        }
        match clauses.remove(0) {
            Clause::Root(node) => {
                let name = node
                    .name
                    .ok_or_else(|| parse_error(input, "missing package name"))?;
                Ok((
                    name,
                    Self {
                        versions: node.versions.unwrap_or_default(),
                        variants: node.variants,
                    },
                ))
            }
            _ => Err(parse_error(input, "expected a package name first")),
        }
    }

    pub fn satisfied_by(&self, state: &DependencyState) -> bool {
        self.versions.contains(&state.version)
            && self.variants.iter().all(|(name, expected)| {
                state
                    .variants
                    .get(name)
                    .map(|actual| actual.matches(expected))
                    .unwrap_or(false)
            })
    }

    /// Combine with another constraint on the same package
    pub fn merge(&mut self, other: &SpecConstraint) {
        if self.versions.is_any() {
            self.versions = other.versions.clone();
        } else if !other.versions.is_any() {
            let lo = match (&self.versions.lo, &other.versions.lo) {
                (Some(a), Some(b)) => Some(a.max(b).clone()),
                (a, b) => a.clone().or_else(|| b.clone()),
            };
            // Upper bounds match by prefix, so the longer of two nested bounds is tighter
            let hi = match (&self.versions.hi, &other.versions.hi) {
                (Some(a), Some(b)) if a.starts_with(b) => Some(a.clone()),
                (Some(a), Some(b)) if b.starts_with(a) => Some(b.clone()),
                (Some(a), Some(b)) => Some(a.min(b).clone()),
                (a, b) => a.clone().or_else(|| b.clone()),
            };
            self.versions = VersionRange { lo, hi };
        }
        for (name, value) in &other.variants {
            if !self.variants.iter().any(|(n, _)| n == name) {
                self.variants.push((name.clone(), value.clone()));
            }
        }
    }
}

impl std::fmt::Display for SpecConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.versions.is_any() {
            write!(f, "@{}", self.versions)?;
        }
        for (name, value) in &self.variants {
            write!(f, " {}", format_variant(name, value))?;
        }
        Ok(())
    }
}

/// A fully concrete `name@version +variants` node
#[derive(Debug, Clone)]
pub(crate) struct ConcreteNode {
    pub name: String,
    pub version: Version,
    pub variants: VariantSelection,
}

/// Parse `name@version +a ~b key=value` where the version must be exact
pub(crate) fn parse_concrete(input: &str) -> Result<ConcreteNode> {
    let mut clauses = parse_clauses(input)?;
    if clauses.len() != 1 {
        return Err(parse_error(input, "expected a single package"));
    }
    let node = match clauses.remove(0) {
        Clause::Root(node) => node,
        _ => return Err(parse_error(input, "expected a package name first")),
    };
    let name = node
        .name
        .ok_or_else(|| parse_error(input, "missing package name"))?;
    let version = match node.versions {
        Some(VersionRange {
            lo: Some(lo),
            hi: Some(hi),
        }) if lo == hi => lo,
        _ => return Err(parse_error(input, "expected an exact '@version'")),
    };

    let mut variants = VariantSelection::default();
    for (name, value) in node.variants {
        variants.set(&name, value);
    }

    Ok(ConcreteNode {
        name,
        version,
        variants,
    })
}

/// Parse a bare list of variant settings (`+ddeve ~ddg4 cxxstd=17`)
pub(crate) fn parse_variant_list(input: &str) -> Result<Vec<(String, VariantValue)>> {
    let mut clauses = parse_clauses(input)?;
    match clauses.len() {
        0 => Ok(Vec::new()),
        1 => match clauses.remove(0) {
            Clause::Root(SpecNode {
                name: None,
                versions: None,
                variants,
            }) => Ok(variants),
            _ => Err(parse_error(input, "expected only variant settings")),
        },
        _ => Err(parse_error(input, "expected only variant settings")),
    }
}

pub(crate) fn format_variant(name: &str, value: &VariantValue) -> String {
    match value {
        VariantValue::Bool(true) => format!("+{}", name),
        VariantValue::Bool(false) => format!("~{}", name),
        VariantValue::Single(v) => format!("{}={}", name, v),
    }
}

fn parse_error(input: &str, reason: &str) -> Error {
    Error::ConditionParse {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Token types for parsing
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Versions(String),
    Enable(String),
    Disable(String),
    KeyValue(String, String),
    Dependency,
    Compiler,
}

#[derive(Debug, Clone, Default)]
struct SpecNode {
    name: Option<String>,
    versions: Option<VersionRange>,
    variants: Vec<(String, VariantValue)>,
}

#[derive(Debug, Clone)]
enum Clause {
    Root(SpecNode),
    Dependency(SpecNode),
    Compiler {
        name: String,
        versions: VersionRange,
    },
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == ':' || c == '_' || c == '-'
}

fn take_while(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    pred: fn(char) -> bool,
) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if pred(c) {
            out.push(c);
            chars.next();
        } else {
            break;
        }
    }
    out
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '@' => {
                chars.next();
                let range = take_while(&mut chars, is_version_char);
                if range.is_empty() {
                    return Err(parse_error(input, "expected version after '@'"));
                }
                tokens.push(Token::Versions(range));
            }
            '+' | '~' => {
                chars.next();
                let name = take_while(&mut chars, is_name_char);
                if name.is_empty() {
                    return Err(parse_error(input, &format!("expected variant after '{}'", c)));
                }
                tokens.push(if c == '+' {
                    Token::Enable(name)
                } else {
                    Token::Disable(name)
                });
            }
            '^' => {
                chars.next();
                tokens.push(Token::Dependency);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Compiler);
            }
            _ if is_name_char(c) => {
                let name = take_while(&mut chars, is_name_char);
                if chars.peek() == Some(&'=') {
                    chars.next();
                    let value = take_while(&mut chars, is_version_char);
                    if value.is_empty() {
                        return Err(parse_error(input, &format!("expected value for '{}='", name)));
                    }
                    tokens.push(Token::KeyValue(name, value));
                } else {
                    tokens.push(Token::Name(name));
                }
            }
            _ => {
                return Err(parse_error(input, &format!("unexpected character '{}'", c)));
            }
        }
    }

    Ok(tokens)
}

/// Recursive descent over `|`, grouping and `!`; runs between operators
/// are handed to the clause parser
///
/// ```text
/// expr := conj ('|' conj)*
/// conj := term*
/// term := '(' expr ')' | '!' '(' expr ')' | clauses
/// ```
struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn expect_close(&mut self) -> Result<()> {
        self.skip_whitespace();
        if self.peek() != Some(')') {
            return Err(parse_error(self.input, "missing ')'"));
        }
        self.pos += 1;
        Ok(())
    }

    fn expr(&mut self) -> Result<Condition> {
        let mut alternatives = vec![self.conj()?];
        loop {
            self.skip_whitespace();
            if self.peek() != Some('|') {
                break;
            }
            self.pos += 1;
            alternatives.push(self.conj()?);
        }

        if alternatives.len() == 1 {
            return Ok(alternatives.remove(0).unwrap_or(Condition::Always));
        }
        alternatives
            .into_iter()
            .map(|alt| alt.ok_or_else(|| parse_error(self.input, "empty alternative")))
            .collect::<Result<Vec<_>>>()
            .map(Condition::Any)
    }

    /// `None` when no term was consumed
    fn conj(&mut self) -> Result<Option<Condition>> {
        let mut terms = Vec::new();
        let mut consumed = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None | Some(')') | Some('|') => break,
                Some('(') => {
                    self.pos += 1;
                    terms.push(self.expr()?);
                    self.expect_close()?;
                }
                Some('!') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    if self.peek() != Some('(') {
                        return Err(parse_error(self.input, "expected '(' after '!'"));
                    }
                    self.pos += 1;
                    let inner = self.expr()?;
                    self.expect_close()?;
                    terms.push(Condition::Not(Box::new(inner)));
                }
                Some(_) => {
                    let rest = &self.input[self.pos..];
                    let len = rest
                        .find(|c: char| matches!(c, '(' | ')' | '|' | '!'))
                        .unwrap_or(rest.len());
                    terms.extend(Condition::from_clauses(self.input, &rest[..len])?);
                    self.pos += len;
                }
            }
            consumed = true;
        }

        Ok(consumed.then(|| Condition::conjunction(terms)))
    }
}

/// Builder state for the clause being parsed
enum Pending {
    Root(SpecNode),
    Dependency(SpecNode),
    Compiler(SpecNode),
}

impl Pending {
    fn node(&mut self) -> &mut SpecNode {
        match self {
            Pending::Root(n) | Pending::Dependency(n) | Pending::Compiler(n) => n,
        }
    }

    fn finish(self, input: &str) -> Result<Option<Clause>> {
        match self {
            Pending::Root(node) => {
                if node.name.is_none() && node.versions.is_none() && node.variants.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Clause::Root(node)))
                }
            }
            Pending::Dependency(node) => Ok(Some(Clause::Dependency(node))),
            Pending::Compiler(node) => {
                if !node.variants.is_empty() {
                    return Err(parse_error(input, "compilers do not take variants"));
                }
                let name = node
                    .name
                    .ok_or_else(|| parse_error(input, "'%' must be followed by a compiler name"))?;
                Ok(Some(Clause::Compiler {
                    name,
                    versions: node.versions.unwrap_or_default(),
                }))
            }
        }
    }
}

fn parse_clauses(input: &str) -> Result<Vec<Clause>> {
    let tokens = tokenize(input)?;
    let mut clauses = Vec::new();
    let mut current = Pending::Root(SpecNode::default());

    for token in tokens {
        match token {
            Token::Dependency | Token::Compiler => {
                let next = if token == Token::Dependency {
                    Pending::Dependency(SpecNode::default())
                } else {
                    Pending::Compiler(SpecNode::default())
                };
                if let Some(clause) = std::mem::replace(&mut current, next).finish(input)? {
                    clauses.push(clause);
                }
            }
            Token::Name(name) => {
                let node = current.node();
                if node.name.is_some() || node.versions.is_some() || !node.variants.is_empty() {
                    return Err(parse_error(input, &format!("unexpected name '{}'", name)));
                }
                node.name = Some(name);
            }
            Token::Versions(range) => {
                let node = current.node();
                if node.versions.is_some() {
                    return Err(parse_error(input, "more than one version range in a clause"));
                }
                node.versions = Some(VersionRange::parse(&range)?);
            }
            Token::Enable(name) => current.node().variants.push((name, VariantValue::Bool(true))),
            Token::Disable(name) => current.node().variants.push((name, VariantValue::Bool(false))),
            Token::KeyValue(name, value) => current
                .node()
                .variants
                .push((name, VariantValue::Single(value))),
        }
    }

    if let Some(clause) = current.finish(input)? {
        clauses.push(clause);
    }

    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::ResolvedVariants;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn variants(pairs: &[(&str, VariantValue)]) -> ResolvedVariants {
        let mut resolved = ResolvedVariants::new(pairs.iter().map(|(n, _)| n.to_string()));
        for (name, value) in pairs {
            resolved.insert(name, value.clone());
        }
        resolved
    }

    #[test]
    fn test_parse_empty_is_always() {
        assert_eq!(Condition::parse("").unwrap(), Condition::Always);
        assert_eq!(Condition::parse("   ").unwrap(), Condition::Always);
    }

    #[test]
    fn test_parse_version_and_variant() {
        let c = Condition::parse("@1.26: +hepmc3").unwrap();
        match c {
            Condition::All(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(
                    parts[0],
                    Condition::Version(VersionRange::parse("1.26:").unwrap())
                );
                assert_eq!(
                    parts[1],
                    Condition::Variant {
                        name: "hepmc3".to_string(),
                        value: VariantValue::Bool(true)
                    }
                );
            }
            other => panic!("Expected All, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_adjacent_sigils() {
        let c = Condition::parse("~ddrec+dddetectors").unwrap();
        assert_eq!(c.referenced_variants(), vec!["ddrec", "dddetectors"]);
    }

    #[test]
    fn test_parse_dependency_clause() {
        let c = Condition::parse("^root@6.28: ~webgui").unwrap();
        match c {
            Condition::Dependency {
                package,
                constraint,
            } => {
                assert_eq!(package, "root");
                assert_eq!(constraint.versions, VersionRange::parse("6.28:").unwrap());
                assert_eq!(
                    constraint.variants,
                    vec![("webgui".to_string(), VariantValue::Bool(false))]
                );
            }
            other => panic!("Expected Dependency, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_compiler_clause() {
        let c = Condition::parse("%gcc@:7").unwrap();
        assert_eq!(
            c,
            Condition::Compiler {
                name: "gcc".to_string(),
                versions: VersionRange::parse(":7").unwrap()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Condition::parse("root@6").is_err());
        assert!(Condition::parse("^").is_err());
        assert!(Condition::parse("+").is_err());
        assert!(Condition::parse("@1.0 @2.0").is_err());
        assert!(Condition::parse("cxxstd=").is_err());
        assert!(Condition::parse("+a $b").is_err());
    }

    #[test]
    fn test_evaluate_against_context() {
        let version = v("1.32");
        let resolved = variants(&[
            ("ddeve", VariantValue::Bool(true)),
            ("cxxstd", VariantValue::Single("20".into())),
        ]);
        let mut deps = BTreeMap::new();
        deps.insert(
            "root".to_string(),
            DependencyState::new(v("6.30.04")).with_variant("webgui", VariantValue::Bool(true)),
        );
        let ctx = EvalContext {
            version: &version,
            variants: &resolved,
            dependencies: &deps,
            compiler: None,
        };

        assert!(Condition::parse("+ddeve @1.24:").unwrap().evaluate(&ctx).unwrap());
        assert!(Condition::parse("cxxstd=20").unwrap().evaluate(&ctx).unwrap());
        assert!(!Condition::parse("cxxstd=17").unwrap().evaluate(&ctx).unwrap());
        assert!(Condition::parse("^root@6.27: +webgui").unwrap().evaluate(&ctx).unwrap());
        assert!(!Condition::parse("^root~webgui").unwrap().evaluate(&ctx).unwrap());
        assert!(!Condition::parse("^hepmc3").unwrap().evaluate(&ctx).unwrap());
        assert!(!Condition::parse("%gcc@:7").unwrap().evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_evaluate_undeclared_variant_is_error() {
        let version = v("1.32");
        let resolved = variants(&[]);
        let deps = BTreeMap::new();
        let ctx = EvalContext {
            version: &version,
            variants: &resolved,
            dependencies: &deps,
            compiler: None,
        };
        assert!(Condition::parse("+nonexistent").unwrap().evaluate(&ctx).is_err());
    }

    #[test]
    fn test_any_and_not() {
        let version = v("1.20");
        let resolved = variants(&[]);
        let deps = BTreeMap::new();
        let ctx = EvalContext {
            version: &version,
            variants: &resolved,
            dependencies: &deps,
            compiler: None,
        };
        let any = Condition::Any(vec![
            Condition::parse("@:1.17").unwrap(),
            Condition::parse("@1.19:1.23").unwrap(),
        ]);
        assert!(any.evaluate(&ctx).unwrap());
        assert!(!Condition::Not(Box::new(any)).evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let c = Condition::parse("@1.24: ^root@6.27: +root7 +webgui").unwrap();
        assert_eq!(c.to_string(), "@1.24: ^root@6.27: +root7 +webgui");
        assert_eq!(Condition::parse(&c.to_string()).unwrap(), c);
    }

    #[test]
    fn test_parse_groups_alternatives_and_negation() {
        let c = Condition::parse("@1.20: (+ddg4 | ^geant4@11:) !(~ddrec)").unwrap();
        assert_eq!(
            c,
            Condition::All(vec![
                Condition::Version(VersionRange::parse("1.20:").unwrap()),
                Condition::Any(vec![
                    Condition::parse("+ddg4").unwrap(),
                    Condition::parse("^geant4@11:").unwrap(),
                ]),
                Condition::Not(Box::new(Condition::parse("~ddrec").unwrap())),
            ])
        );
        assert_eq!(Condition::parse("(+a) (+b)").unwrap(), Condition::parse("+a +b").unwrap());
        assert_eq!(Condition::parse("( )").unwrap(), Condition::Always);
    }

    #[test]
    fn test_parse_operator_errors() {
        assert!(Condition::parse("(+a").is_err());
        assert!(Condition::parse("+a)").is_err());
        assert!(Condition::parse("!+a").is_err());
        assert!(Condition::parse("+a |").is_err());
        assert!(Condition::parse("| +a").is_err());
        assert!(Condition::parse("(+a) | | (+b)").is_err());
    }

    #[test]
    fn test_any_and_not_survive_serde() {
        let any = Condition::Any(vec![
            Condition::parse("@:1.17").unwrap(),
            Condition::parse("@1.19:1.23 +ddg4").unwrap(),
        ]);
        let not = Condition::Not(Box::new(any.clone()));
        let nested = Condition::All(vec![Condition::parse("~ddrec").unwrap(), any.clone()]);

        let mixed = Condition::All(vec![
            Condition::parse("^root@6.28: ~webgui").unwrap(),
            Condition::parse("%gcc@:7").unwrap(),
            Condition::parse("@1.24:").unwrap(),
            Condition::parse("+ddeve").unwrap(),
            Condition::parse("@:1.30").unwrap(),
        ]);

        for c in [any, not, nested, mixed] {
            let json = serde_json::to_string(&c).unwrap();
            let back: Condition = serde_json::from_str(&json).unwrap();
            assert_eq!(back, c, "{}", json);
        }
    }

    #[test]
    fn test_spec_constraint_parse_named() {
        let (name, c) = SpecConstraint::parse_named("root @6.08: +gdml +math +python").unwrap();
        assert_eq!(name, "root");
        assert_eq!(c.versions, VersionRange::parse("6.08:").unwrap());
        assert_eq!(c.variants.len(), 3);
        assert!(SpecConstraint::parse_named("+gdml").is_err());
        assert!(SpecConstraint::parse_named("root ^boost").is_err());
    }

    #[test]
    fn test_spec_constraint_merge() {
        let (_, mut a) = SpecConstraint::parse_named("podio@0.16:").unwrap();
        let (_, b) = SpecConstraint::parse_named("podio@:0 cxxstd=20").unwrap();
        a.merge(&b);
        assert_eq!(a.versions.to_string(), "0.16:0");
        assert_eq!(a.variants.len(), 1);
    }
}
