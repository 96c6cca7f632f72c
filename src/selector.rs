use crate::dom::{Dom, NodeId};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
}

impl SelectorStep {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
    }

    pub(crate) fn id_only(&self) -> Option<&str> {
        if !self.universal && self.tag.is_none() && self.classes.is_empty() && self.attrs.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

pub(crate) fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let chars = selector.chars().collect::<Vec<_>>();
    let mut parts = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;
    let mut step = SelectorStep::default();
    let mut i = 0usize;

    let flush =
        |step: &mut SelectorStep,
         pending: &mut Option<SelectorCombinator>,
         parts: &mut Vec<SelectorPart>|
         -> Result<()> {
            if step.is_empty() {
                return Ok(());
            }
            let combinator = if parts.is_empty() {
                None
            } else {
                Some(pending.take().unwrap_or(SelectorCombinator::Descendant))
            };
            parts.push(SelectorPart {
                step: std::mem::take(step),
                combinator,
            });
            Ok(())
        };

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => {
                flush(&mut step, &mut pending_combinator, &mut parts)?;
                i += 1;
            }
            '>' => {
                flush(&mut step, &mut pending_combinator, &mut parts)?;
                if parts.is_empty() || pending_combinator.is_some() {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                pending_combinator = Some(SelectorCombinator::Child);
                i += 1;
            }
            '*' => {
                step.universal = true;
                i += 1;
            }
            '#' => {
                let (name, next) = read_name(&chars, i + 1);
                if name.is_empty() {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                step.id = Some(name);
                i = next;
            }
            '.' => {
                let (name, next) = read_name(&chars, i + 1);
                if name.is_empty() {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                step.classes.push(name);
                i = next;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| Error::UnsupportedSelector(selector.into()))?;
                let body = chars[i + 1..close].iter().collect::<String>();
                step.attrs.push(parse_attr_condition(&body, selector)?);
                i = close + 1;
            }
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => {
                let (name, next) = read_name(&chars, i);
                step.tag = Some(name.to_ascii_lowercase());
                i = next;
            }
            _ => return Err(Error::UnsupportedSelector(selector.into())),
        }
    }
    flush(&mut step, &mut pending_combinator, &mut parts)?;

    if parts.is_empty() || pending_combinator.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(parts)
}

fn read_name(chars: &[char], from: usize) -> (String, usize) {
    let mut i = from;
    let mut name = String::new();
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-' || chars[i] == '_')
    {
        name.push(chars[i]);
        i += 1;
    }
    (name, i)
}

fn parse_attr_condition(body: &str, selector: &str) -> Result<SelectorAttrCondition> {
    let body = body.trim();
    if let Some(eq) = body.find('=') {
        let key = body[..eq].trim().to_ascii_lowercase();
        let mut value = body[eq + 1..].trim();
        if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            value = &value[1..value.len() - 1];
        }
        if key.is_empty() {
            return Err(Error::UnsupportedSelector(selector.into()));
        }
        Ok(SelectorAttrCondition::Eq {
            key,
            value: value.to_string(),
        })
    } else {
        if body.is_empty() {
            return Err(Error::UnsupportedSelector(selector.into()));
        }
        Ok(SelectorAttrCondition::Exists {
            key: body.to_ascii_lowercase(),
        })
    }
}

pub(crate) fn step_matches(dom: &Dom, node: NodeId, step: &SelectorStep) -> bool {
    let Some(element) = dom.element(node) else {
        return false;
    };
    if let Some(tag) = &step.tag {
        if !element.tag_name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if dom.attr(node, "id") != Some(id.as_str()) {
            return false;
        }
    }
    for class in &step.classes {
        if !dom.has_class(node, class) {
            return false;
        }
    }
    for condition in &step.attrs {
        match condition {
            SelectorAttrCondition::Exists { key } => {
                if dom.attr(node, key).is_none() {
                    return false;
                }
            }
            SelectorAttrCondition::Eq { key, value } => {
                if dom.attr(node, key) != Some(value.as_str()) {
                    return false;
                }
            }
        }
    }
    true
}

pub(crate) fn chain_matches(dom: &Dom, node: NodeId, parts: &[SelectorPart]) -> bool {
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };
    if !step_matches(dom, node, &last.step) {
        return false;
    }
    match last.combinator {
        None => true,
        Some(SelectorCombinator::Child) => match dom.parent(node) {
            Some(parent) => chain_matches(dom, parent, rest),
            None => false,
        },
        Some(SelectorCombinator::Descendant) => {
            let mut cursor = dom.parent(node);
            while let Some(ancestor) = cursor {
                if chain_matches(dom, ancestor, rest) {
                    return true;
                }
                cursor = dom.parent(ancestor);
            }
            false
        }
    }
}

pub(crate) fn query_all(dom: &Dom, selector: &str) -> Result<Vec<NodeId>> {
    let parts = parse_selector_chain(selector)?;

    if parts.len() == 1 {
        if let Some(id) = parts[0].step.id_only() {
            return Ok(dom.by_id(id).into_iter().collect());
        }
    }

    Ok(dom
        .elements_in_document_order()
        .into_iter()
        .filter(|node| chain_matches(dom, *node, &parts))
        .collect())
}

pub(crate) fn query_one(dom: &Dom, selector: &str) -> Result<NodeId> {
    query_all(dom, selector)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::SelectorNotFound(selector.into()))
}
