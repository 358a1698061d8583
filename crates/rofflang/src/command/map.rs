//! Map type
use super::*;
use std::collections::HashMap;

/// Map is the request table: a map from names to commands.
///
/// Requests and macros share a single namespace.
/// Macros are stored as [ElementBuffer]s, which are shared on copy.
/// Aliasing or renaming a macro is therefore cheap,
///     and a later mutation of one of the names copies the buffer first.
pub struct Map<S> {
    commands: HashMap<Name, Command<S>>,
    built_in_commands: HashMap<Name, BuiltIn<S>>,
}

/// Error returned when the target of an alias is not defined.
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidAlias;

impl<S> Map<S> {
    pub(crate) fn new(built_in_commands: HashMap<Name, BuiltIn<S>>) -> Map<S> {
        Self {
            commands: built_in_commands
                .iter()
                .map(|(k, v)| (*k, v.cmd.clone()))
                .collect(),
            built_in_commands,
        }
    }

    #[inline]
    pub fn get(&self, name: Name) -> Option<&Command<S>> {
        self.commands.get(&name)
    }

    /// Returns the macro with the provided name, if the name is defined as a macro.
    pub fn get_macro(&self, name: Name) -> Option<&ElementBuffer> {
        self.get(name).and_then(Command::as_macro)
    }

    /// Returns a mutable reference to the macro with the provided name.
    ///
    /// If the buffer is shared with another name, it is copied on the first mutation.
    pub fn get_macro_mut(&mut self, name: Name) -> Option<&mut ElementBuffer> {
        match self.commands.get_mut(&name) {
            Some(Command::Macro(buffer)) => Some(buffer),
            _ => None,
        }
    }

    pub fn contains(&self, name: Name) -> bool {
        self.commands.contains_key(&name)
    }

    /// Returns the command with the provided name,
    ///     creating an empty macro if the name is not defined.
    ///
    /// The boolean is true if the macro was created.
    pub fn lookup_or_create(&mut self, name: Name) -> (&Command<S>, bool) {
        let mut created = false;
        let command = self.commands.entry(name).or_insert_with(|| {
            created = true;
            Command::Macro(ElementBuffer::new())
        });
        (command, created)
    }

    pub fn built_in_commands(&self) -> &HashMap<Name, BuiltIn<S>> {
        &self.built_in_commands
    }

    pub fn insert(&mut self, name: Name, command: Command<S>) {
        self.commands.insert(name, command);
    }

    pub fn insert_macro(&mut self, name: Name, buffer: ElementBuffer) {
        self.insert(name, Command::Macro(buffer));
    }

    pub fn remove(&mut self, name: Name) -> Option<Command<S>> {
        self.commands.remove(&name)
    }

    /// Renames a command.
    ///
    /// Returns false if there is no command with the old name.
    pub fn rename(&mut self, old: Name, new: Name) -> bool {
        match self.commands.remove(&old) {
            None => false,
            Some(command) => {
                self.commands.insert(new, command);
                true
            }
        }
    }

    /// Makes `alias` another name for the command currently named `target`.
    pub fn alias(&mut self, alias: Name, target: Name) -> std::result::Result<(), InvalidAlias> {
        let command = match self.commands.get(&target) {
            None => return Err(InvalidAlias {}),
            Some(t) => t.clone(),
        };
        self.insert(alias, command);
        Ok(())
    }

    /// Iterates over the names of all the commands in the map.
    pub fn names(&self) -> impl Iterator<Item = Name> + '_ {
        self.commands.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::NameInterner;

    fn noop(_: Name, _: &mut vm::ExecutionInput<()>) -> rl::Result<()> {
        Ok(())
    }

    fn setup() -> (NameInterner, Map<()>) {
        let mut interner = NameInterner::default();
        let de = interner.get_or_intern("de");
        let map = Map::new(HashMap::from([(de, BuiltIn::new_request(noop))]));
        (interner, map)
    }

    #[test]
    fn built_ins_are_commands() {
        let (mut interner, map) = setup();
        let de = interner.get_or_intern("de");
        assert!(matches!(map.get(de), Some(Command::BuiltIn(_))));
        assert_eq!(map.built_in_commands().len(), 1);
    }

    #[test]
    fn lookup_or_create_is_idempotent() {
        let (mut interner, mut map) = setup();
        let foo = interner.get_or_intern("foo");
        let (command, created) = map.lookup_or_create(foo);
        assert!(created);
        assert_eq!(command.as_macro(), Some(&ElementBuffer::new()));
        let (_, created) = map.lookup_or_create(foo);
        assert!(!created);
    }

    #[test]
    fn alias_shares_until_mutation() {
        let (mut interner, mut map) = setup();
        let a = interner.get_or_intern("a");
        let b = interner.get_or_intern("b");
        map.insert_macro(a, ElementBuffer::from_bytes(b"text"));
        map.alias(b, a).unwrap();
        assert_eq!(map.get_macro(a).map(ElementBuffer::share_count), Some(2));
        map.get_macro_mut(b).unwrap().append_byte(b'!');
        assert_eq!(map.get_macro(a).unwrap().to_text(), "text");
        assert_eq!(map.get_macro(b).unwrap().to_text(), "text!");
        assert_eq!(map.get_macro(a).map(ElementBuffer::share_count), Some(1));
    }

    #[test]
    fn alias_of_undefined_target_fails() {
        let (mut interner, mut map) = setup();
        let a = interner.get_or_intern("a");
        let b = interner.get_or_intern("b");
        assert_eq!(map.alias(b, a), Err(InvalidAlias));
        assert!(!map.contains(b));
    }

    #[test]
    fn rename_and_remove() {
        let (mut interner, mut map) = setup();
        let de = interner.get_or_intern("de");
        let define = interner.get_or_intern("define");
        assert!(map.rename(de, define));
        assert!(!map.contains(de));
        assert!(matches!(map.get(define), Some(Command::BuiltIn(_))));
        assert!(!map.rename(de, define));
        assert!(map.remove(define).is_some());
        assert!(map.remove(define).is_none());
    }
}
