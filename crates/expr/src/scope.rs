//! Group variable scopes and lexical variable resolution.
//!
//! Every group owns a stack of frames, one per active invocation of the
//! group. A variable reference looks at the current context's local map first,
//! then at the top frame of its lexically enclosing group, then at that
//! group's parent, out to the top-level group.

use crate::context::Context;
use crate::name::ExpandedName;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

#[derive(Debug, Default)]
struct Group {
    name: Option<String>,
    parent: Option<GroupId>,
    frames: Vec<HashMap<ExpandedName, Value>>,
}

/// The arena of all groups of a compiled stylesheet with their variable frames.
#[derive(Debug, Default)]
pub struct GroupScopes {
    groups: Vec<Group>,
}

impl GroupScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a group nested in `parent` (or a top-level group).
    pub fn add_group(&mut self, name: Option<&str>, parent: Option<GroupId>) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(Group {
            name: name.map(str::to_string),
            parent,
            frames: Vec::new(),
        });
        id
    }

    pub fn parent(&self, group: GroupId) -> Option<GroupId> {
        self.groups.get(group.0).and_then(|g| g.parent)
    }

    pub fn name(&self, group: GroupId) -> Option<&str> {
        self.groups.get(group.0).and_then(|g| g.name.as_deref())
    }

    /// Starts a new invocation of `group`.
    pub fn push_frame(&mut self, group: GroupId) {
        if let Some(g) = self.groups.get_mut(group.0) {
            g.frames.push(HashMap::new());
        }
    }

    /// Ends the innermost invocation of `group`, returning its bindings.
    pub fn pop_frame(&mut self, group: GroupId) -> Option<HashMap<ExpandedName, Value>> {
        self.groups.get_mut(group.0).and_then(|g| g.frames.pop())
    }

    /// Binds `name` in the innermost frame of `group`, opening one if the
    /// group has no active invocation yet.
    pub fn bind(&mut self, group: GroupId, name: ExpandedName, value: Value) {
        if let Some(g) = self.groups.get_mut(group.0) {
            if g.frames.is_empty() {
                g.frames.push(HashMap::new());
            }
            if let Some(frame) = g.frames.last_mut() {
                frame.insert(name, value);
            }
        }
    }

    /// Finds the group that currently binds `name`, starting at `group` and
    /// walking outward.
    pub fn declaring_group(&self, group: GroupId, name: &ExpandedName) -> Option<GroupId> {
        let mut current = Some(group);
        while let Some(id) = current {
            if self.groups.get(id.0)?.frames.last().is_some_and(|f| f.contains_key(name)) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// Borrowed view of the binding visible from `group`.
    pub fn lookup(&self, group: GroupId, name: &ExpandedName) -> Option<&Value> {
        let id = self.declaring_group(group, name)?;
        self.groups[id.0].frames.last()?.get(name)
    }
}

/// Resolves a variable reference. `lexical_group` is the group the reference
/// was compiled in; references compiled outside any group use the context's
/// current group. The result is always an owned copy.
pub fn resolve_variable(
    context: &Context,
    name: &ExpandedName,
    lexical_group: Option<GroupId>,
) -> Option<Value> {
    if let Some(v) = context.local_vars.get(name) {
        return Some(v.deep_copy());
    }
    let group = lexical_group.or(context.current_group)?;
    context.groups.lookup(group, name).map(Value::deep_copy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let mut scopes = GroupScopes::new();
        let outer = scopes.add_group(None, None);
        let inner = scopes.add_group(Some("inner"), Some(outer));
        scopes.bind(outer, ExpandedName::local("x"), Value::from_number(1.0));
        scopes.push_frame(inner);

        assert_eq!(
            scopes.lookup(inner, &ExpandedName::local("x")),
            Some(&Value::from_number(1.0))
        );
        assert_eq!(
            scopes.declaring_group(inner, &ExpandedName::local("x")),
            Some(outer)
        );
        assert!(scopes.lookup(inner, &ExpandedName::local("y")).is_none());
        assert_eq!(scopes.name(inner), Some("inner"));
        assert_eq!(scopes.parent(inner), Some(outer));
        assert_eq!(scopes.parent(outer), None);
    }

    #[test]
    fn test_innermost_frame_wins() {
        let mut scopes = GroupScopes::new();
        let g = scopes.add_group(None, None);
        scopes.push_frame(g);
        scopes.bind(g, ExpandedName::local("n"), Value::from_number(1.0));
        scopes.push_frame(g);
        scopes.bind(g, ExpandedName::local("n"), Value::from_number(2.0));
        assert_eq!(
            scopes.lookup(g, &ExpandedName::local("n")),
            Some(&Value::from_number(2.0))
        );
        scopes.pop_frame(g);
        assert_eq!(
            scopes.lookup(g, &ExpandedName::local("n")),
            Some(&Value::from_number(1.0))
        );
    }

    #[test]
    fn test_local_binding_shadows_group() {
        let mut ctx = Context::new();
        let g = ctx.groups.add_group(None, None);
        ctx.groups
            .bind(g, ExpandedName::local("v"), Value::from_string("group"));
        let name = ExpandedName::local("v");

        assert_eq!(
            resolve_variable(&ctx, &name, Some(g)),
            Some(Value::from_string("group"))
        );
        ctx.local_vars.insert(name.clone(), Value::from_string("local"));
        assert_eq!(
            resolve_variable(&ctx, &name, Some(g)),
            Some(Value::from_string("local"))
        );
    }

    #[test]
    fn test_unscoped_reference_uses_current_group() {
        let mut ctx = Context::new();
        let g = ctx.groups.add_group(None, None);
        ctx.groups
            .bind(g, ExpandedName::local("v"), Value::from_number(5.0));
        assert!(resolve_variable(&ctx, &ExpandedName::local("v"), None).is_none());
        ctx.current_group = Some(g);
        assert_eq!(
            resolve_variable(&ctx, &ExpandedName::local("v"), None),
            Some(Value::from_number(5.0))
        );
    }
}
