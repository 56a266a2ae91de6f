use super::parser::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::{Value, XNode, XPathError};
use crate::dom::{Document, NodeId, NodeKind};

#[derive(Debug, Clone, Copy)]
struct Context {
    node: XNode,
    position: usize,
    size: usize,
}

/// Evaluates compiled expressions against one document
pub struct Evaluator<'d> {
    doc: &'d Document,
}

impl<'d> Evaluator<'d> {
    pub fn new(doc: &'d Document) -> Self {
        Self { doc }
    }

    /// Evaluates with the document root as context node
    pub fn evaluate(&self, expr: &Expr) -> Result<Value, XPathError> {
        let root = Context {
            node: XNode::Node(Document::ROOT),
            position: 1,
            size: 1,
        };
        self.eval(expr, &root)
    }

    fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Value, XPathError> {
        match expr {
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Negate(inner) => {
                let value = self.eval(inner, ctx)?;
                Ok(Value::Number(-self.number(&value)))
            }
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    XNode::Node(Document::ROOT)
                } else {
                    ctx.node
                };
                Ok(Value::Nodes(self.apply_steps(vec![start], steps)?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let Value::Nodes(mut nodes) = self.eval(primary, ctx)? else {
                    return Err(XPathError::NotANodeSet);
                };
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                if !steps.is_empty() {
                    nodes = self.apply_steps(nodes, steps)?;
                }
                Ok(Value::Nodes(nodes))
            }
            Expr::Binary(op, left, right) => self.binary(*op, left, right, ctx),
            Expr::Call(name, args) => self.call(name, args, ctx),
        }
    }

    fn apply_steps(&self, mut nodes: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>, XPathError> {
        for step in steps {
            let mut selected = Vec::new();
            for &node in &nodes {
                let mut candidates: Vec<XNode> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|&candidate| self.matches(candidate, &step.test))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                selected.extend(candidates);
            }
            selected.sort();
            selected.dedup();
            nodes = selected;
        }
        Ok(nodes)
    }

    /// Keeps the nodes for which `predicate` holds; `nodes` is in proximity order
    fn filter(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Number(n) => n == (index + 1) as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along `axis` in proximity order
    fn axis(&self, node: XNode, axis: Axis) -> Vec<XNode> {
        let doc = self.doc;
        let id = match node {
            XNode::Node(id) => id,
            XNode::Attr(owner, _) => {
                return match axis {
                    Axis::SelfAxis => vec![node],
                    Axis::Parent => vec![XNode::Node(owner)],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut out = Vec::new();
                        if axis == Axis::AncestorOrSelf {
                            out.push(node);
                        }
                        out.push(XNode::Node(owner));
                        out.extend(self.parent_chain(owner).map(XNode::Node));
                        out
                    }
                    Axis::Following => (owner + 1..doc.len()).map(XNode::Node).collect(),
                    Axis::Preceding => self.axis(XNode::Node(owner), Axis::Preceding),
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => doc.children(id).iter().copied().map(XNode::Node).collect(),
            Axis::Descendant => (id + 1..doc.subtree_end(id)).map(XNode::Node).collect(),
            Axis::DescendantOrSelf => (id..doc.subtree_end(id)).map(XNode::Node).collect(),
            Axis::SelfAxis => vec![node],
            Axis::Parent => doc.parent(id).map(XNode::Node).into_iter().collect(),
            Axis::Ancestor => self.parent_chain(id).map(XNode::Node).collect(),
            Axis::AncestorOrSelf => std::iter::once(id)
                .chain(self.parent_chain(id))
                .map(XNode::Node)
                .collect(),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Some(parent) = doc.parent(id) else {
                    return Vec::new();
                };
                let siblings = doc.children(parent);
                let index = siblings.iter().position(|&s| s == id).unwrap_or(0);
                if axis == Axis::FollowingSibling {
                    siblings[index + 1..].iter().copied().map(XNode::Node).collect()
                } else {
                    siblings[..index].iter().rev().copied().map(XNode::Node).collect()
                }
            }
            Axis::Following => (doc.subtree_end(id)..doc.len()).map(XNode::Node).collect(),
            Axis::Preceding => {
                let ancestors: Vec<NodeId> = self.parent_chain(id).collect();
                (0..id)
                    .rev()
                    .filter(|n| !ancestors.contains(n))
                    .map(XNode::Node)
                    .collect()
            }
            Axis::Attribute => (0..doc.attributes(id).len())
                .map(|i| XNode::Attr(id, i))
                .collect(),
        }
    }

    /// Parents up to and including the document root
    fn parent_chain(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.doc.parent(id), move |&p| self.doc.parent(p))
    }

    fn matches(&self, node: XNode, test: &NodeTest) -> bool {
        match node {
            XNode::Attr(owner, index) => match test {
                NodeTest::Name(name) => self.doc.attributes(owner)[index]
                    .0
                    .eq_ignore_ascii_case(name),
                NodeTest::Wildcard | NodeTest::Node => true,
                NodeTest::Text | NodeTest::Comment => false,
            },
            XNode::Node(id) => match (test, &self.doc.node(id).kind) {
                (NodeTest::Name(name), NodeKind::Element { tag, .. }) => tag == name,
                (NodeTest::Wildcard, NodeKind::Element { .. }) => true,
                (NodeTest::Text, NodeKind::Text { .. }) => true,
                (NodeTest::Node, _) => true,
                _ => false,
            },
        }
    }

    pub fn string_value(&self, node: XNode) -> String {
        match node {
            XNode::Node(id) => self.doc.text_content(id),
            XNode::Attr(owner, index) => self.doc.attributes(owner)[index].1.clone(),
        }
    }

    fn node_name(&self, node: XNode) -> String {
        match node {
            XNode::Node(id) => self.doc.tag(id).unwrap_or_default().to_string(),
            XNode::Attr(owner, index) => self.doc.attributes(owner)[index].0.clone(),
        }
    }

    pub fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|&n| self.string_value(n))
                .unwrap_or_default(),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.string(other)),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ctx: &Context,
    ) -> Result<Value, XPathError> {
        match op {
            BinaryOp::Or => {
                let l = self.eval(left, ctx)?;
                if self.boolean(&l) {
                    return Ok(Value::Boolean(true));
                }
                let r = self.eval(right, ctx)?;
                Ok(Value::Boolean(self.boolean(&r)))
            }
            BinaryOp::And => {
                let l = self.eval(left, ctx)?;
                if !self.boolean(&l) {
                    return Ok(Value::Boolean(false));
                }
                let r = self.eval(right, ctx)?;
                Ok(Value::Boolean(self.boolean(&r)))
            }
            BinaryOp::Union => {
                let (Value::Nodes(mut l), Value::Nodes(r)) =
                    (self.eval(left, ctx)?, self.eval(right, ctx)?)
                else {
                    return Err(XPathError::NotANodeSet);
                };
                l.extend(r);
                l.sort();
                l.dedup();
                Ok(Value::Nodes(l))
            }
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                Ok(Value::Boolean(self.compare(op, &l, &r)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.number(&self.eval(left, ctx)?);
                let r = self.number(&self.eval(right, ctx)?);
                Ok(Value::Number(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    _ => l % r,
                }))
            }
        }
    }

    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(l), Value::Nodes(r)) => l.iter().any(|&a| {
                let a = Value::String(self.string_value(a));
                r.iter()
                    .any(|&b| self.compare_atoms(op, &a, &Value::String(self.string_value(b))))
            }),
            (Value::Nodes(nodes), other) => match other {
                Value::Boolean(_) => {
                    self.compare_atoms(op, &Value::Boolean(!nodes.is_empty()), other)
                }
                _ => nodes
                    .iter()
                    .any(|&n| self.compare_atoms(op, &self.atom_like(n, other), other)),
            },
            (other, Value::Nodes(nodes)) => match other {
                Value::Boolean(_) => {
                    self.compare_atoms(op, other, &Value::Boolean(!nodes.is_empty()))
                }
                _ => nodes
                    .iter()
                    .any(|&n| self.compare_atoms(op, other, &self.atom_like(n, other))),
            },
            _ => self.compare_atoms(op, left, right),
        }
    }

    /// The node's value converted to the type of `other`
    fn atom_like(&self, node: XNode, other: &Value) -> Value {
        let s = self.string_value(node);
        match other {
            Value::Number(_) => Value::Number(parse_number(&s)),
            _ => Value::String(s),
        }
    }

    fn compare_atoms(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                let equal = if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_))
                {
                    self.boolean(left) == self.boolean(right)
                } else if matches!(left, Value::Number(_)) || matches!(right, Value::Number(_)) {
                    self.number(left) == self.number(right)
                } else {
                    self.string(left) == self.string(right)
                };
                equal == (op == BinaryOp::Eq)
            }
            _ => {
                let (l, r) = (self.number(left), self.number(right));
                match op {
                    BinaryOp::Lt => l < r,
                    BinaryOp::LtEq => l <= r,
                    BinaryOp::Gt => l > r,
                    _ => l >= r,
                }
            }
        }
    }

    fn call(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        let values = args
            .iter()
            .map(|arg| self.eval(arg, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let context_value = || Value::Nodes(vec![ctx.node]);
        let string_arg = |i: usize| match values.get(i) {
            Some(v) => self.string(v),
            None => self.string(&context_value()),
        };

        let value = match name {
            "last" => {
                arity(name, &values, 0, 0)?;
                Value::Number(ctx.size as f64)
            }
            "position" => {
                arity(name, &values, 0, 0)?;
                Value::Number(ctx.position as f64)
            }
            "count" => {
                arity(name, &values, 1, 1)?;
                match &values[0] {
                    Value::Nodes(nodes) => Value::Number(nodes.len() as f64),
                    _ => return Err(XPathError::NotANodeSet),
                }
            }
            "sum" => {
                arity(name, &values, 1, 1)?;
                match &values[0] {
                    Value::Nodes(nodes) => Value::Number(
                        nodes
                            .iter()
                            .map(|&n| parse_number(&self.string_value(n)))
                            .sum(),
                    ),
                    _ => return Err(XPathError::NotANodeSet),
                }
            }
            "name" | "local-name" => {
                arity(name, &values, 0, 1)?;
                let node = match values.first() {
                    Some(Value::Nodes(nodes)) => nodes.first().copied(),
                    Some(_) => return Err(XPathError::NotANodeSet),
                    None => Some(ctx.node),
                };
                Value::String(node.map(|n| self.node_name(n)).unwrap_or_default())
            }
            "string" => {
                arity(name, &values, 0, 1)?;
                Value::String(string_arg(0))
            }
            "concat" => {
                arity(name, &values, 2, usize::MAX)?;
                Value::String(values.iter().map(|v| self.string(v)).collect())
            }
            "contains" | "starts-with" | "ends-with" | "substring-before" | "substring-after" => {
                arity(name, &values, 2, 2)?;
                let haystack = self.string(&values[0]);
                let needle = self.string(&values[1]);
                match name {
                    "contains" => Value::Boolean(haystack.contains(&needle)),
                    "starts-with" => Value::Boolean(haystack.starts_with(&needle)),
                    "ends-with" => Value::Boolean(haystack.ends_with(&needle)),
                    "substring-before" => Value::String(
                        haystack
                            .split_once(&needle)
                            .map(|(before, _)| before.to_string())
                            .unwrap_or_default(),
                    ),
                    _ => Value::String(
                        haystack
                            .split_once(&needle)
                            .map(|(_, after)| after.to_string())
                            .unwrap_or_default(),
                    ),
                }
            }
            "substring" => {
                arity(name, &values, 2, 3)?;
                let s = self.string(&values[0]);
                let start = round(self.number(&values[1]));
                let end = match values.get(2) {
                    Some(len) => start + round(self.number(len)),
                    None => f64::INFINITY,
                };
                Value::String(
                    s.chars()
                        .enumerate()
                        .filter(|&(i, _)| {
                            let p = (i + 1) as f64;
                            p >= start && p < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "normalize-space" => {
                arity(name, &values, 0, 1)?;
                Value::String(string_arg(0).split_whitespace().collect::<Vec<_>>().join(" "))
            }
            "string-length" => {
                arity(name, &values, 0, 1)?;
                Value::Number(string_arg(0).chars().count() as f64)
            }
            "translate" => {
                arity(name, &values, 3, 3)?;
                let from: Vec<char> = self.string(&values[1]).chars().collect();
                let to: Vec<char> = self.string(&values[2]).chars().collect();
                Value::String(
                    self.string(&values[0])
                        .chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "lower-case" | "upper-case" => {
                arity(name, &values, 1, 1)?;
                let s = self.string(&values[0]);
                Value::String(if name == "lower-case" {
                    s.to_lowercase()
                } else {
                    s.to_uppercase()
                })
            }
            "not" => {
                arity(name, &values, 1, 1)?;
                Value::Boolean(!self.boolean(&values[0]))
            }
            "boolean" => {
                arity(name, &values, 1, 1)?;
                Value::Boolean(self.boolean(&values[0]))
            }
            "true" | "false" => {
                arity(name, &values, 0, 0)?;
                Value::Boolean(name == "true")
            }
            "number" => {
                arity(name, &values, 0, 1)?;
                match values.first() {
                    Some(v) => Value::Number(self.number(v)),
                    None => Value::Number(self.number(&context_value())),
                }
            }
            "floor" | "ceiling" | "round" => {
                arity(name, &values, 1, 1)?;
                let n = self.number(&values[0]);
                Value::Number(match name {
                    "floor" => n.floor(),
                    "ceiling" => n.ceil(),
                    _ => round(n),
                })
            }
            _ => return Err(XPathError::UnknownFunction(name.to_string())),
        };
        Ok(value)
    }
}

fn arity(name: &str, values: &[Value], min: usize, max: usize) -> Result<(), XPathError> {
    if values.len() < min || values.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(XPathError::Arity {
            name: name.to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

/// XPath `number()` conversion of a string: optional minus, digits, optional fraction
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && digits != ".";
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
