// ABOUTME: Provider index mapping each argument to the node that produces it
// ABOUTME: Shared by pipelines (over steps) and collections (over pipelines) to derive graph edges

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::argument::{Argument, ArgumentType};
use super::error::{PipelineError, Result};
use crate::graph::ROOT_ID;

/// Anything that can sit in a dependency graph and declare data dependencies.
pub(crate) trait Dependent {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn requires(&self) -> &[Argument];
    fn provides(&self) -> &[Argument];

    fn is_background(&self) -> bool {
        false
    }

    /// Whether ordering is also declared outside of `requires`.
    fn has_explicit_dependencies(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ProviderIndex {
    providers: HashMap<Argument, i64>,
    root: Vec<i64>,
}

impl ProviderIndex {
    /// Record what `item` provides. Fails without modifying the index if any
    /// argument already has a different provider.
    pub fn register<D: Dependent>(&mut self, item: &D) -> Result<()> {
        if item.is_background() {
            if !item.provides().is_empty() {
                warn!(
                    name = item.name(),
                    "Ignoring arguments provided by background step; nothing can wait on it"
                );
            }
            return Ok(());
        }

        for argument in item.provides() {
            if let Some(&existing) = self.providers.get(argument) {
                if existing != item.id() {
                    return Err(PipelineError::AmbiguousProvider {
                        argument: argument.clone(),
                        existing,
                        duplicate: item.id(),
                    });
                }
            }
        }

        for argument in item.provides() {
            self.providers.insert(argument.clone(), item.id());
        }

        if item.requires().is_empty() && !item.has_explicit_dependencies() {
            self.root.push(item.id());
        }

        Ok(())
    }

    pub fn provider(&self, argument: &Argument) -> Option<i64> {
        self.providers.get(argument).copied()
    }

    pub fn providers(&self) -> &HashMap<Argument, i64> {
        &self.providers
    }

    pub fn root(&self) -> &[i64] {
        &self.root
    }

    /// Compute the edge list for `items`.
    ///
    /// Requirements without a registered provider are satisfied by the root
    /// when listed in `from_root`, skipped when secret, and rejected through
    /// `missing` otherwise. `from_root` only applies to this call; a registered
    /// provider always wins over it. `explicit` edges are kept as-is.
    /// Background items and items left without any parent hang off the root.
    pub fn resolve<'a, D, I, M>(
        &self,
        items: I,
        from_root: &[Argument],
        explicit: &[(i64, i64)],
        missing: M,
    ) -> Result<Vec<(i64, i64)>>
    where
        D: Dependent + 'a,
        I: IntoIterator<Item = &'a D>,
        M: Fn(&str, &Argument) -> PipelineError,
    {
        let root: HashSet<i64> = self.root.iter().copied().collect();
        let mut edges = Vec::new();

        for item in items {
            let id = item.id();

            if item.is_background() {
                edges.push((ROOT_ID, id));
                continue;
            }

            let mut has_parent = explicit.iter().any(|&(_, to)| to == id);

            if root.contains(&id) {
                edges.push((ROOT_ID, id));
                has_parent = true;
            }

            for argument in item.requires() {
                if let Some(provider) = self.provider(argument) {
                    edges.push((provider, id));
                    has_parent = true;
                } else if from_root.contains(argument) {
                    edges.push((ROOT_ID, id));
                    has_parent = true;
                } else if argument.kind == ArgumentType::Secret {
                    debug!(name = item.name(), argument = %argument, "Secret left for the client to resolve");
                } else {
                    return Err(missing(item.name(), argument));
                }
            }

            if !has_parent {
                edges.push((ROOT_ID, id));
            }
        }

        edges.extend_from_slice(explicit);
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        id: i64,
        requires: Vec<Argument>,
        provides: Vec<Argument>,
        background: bool,
    }

    impl Item {
        fn new(id: i64, requires: Vec<Argument>, provides: Vec<Argument>) -> Self {
            Self {
                id,
                requires,
                provides,
                background: false,
            }
        }
    }

    impl Dependent for Item {
        fn id(&self) -> i64 {
            self.id
        }
        fn name(&self) -> &str {
            "item"
        }
        fn requires(&self) -> &[Argument] {
            &self.requires
        }
        fn provides(&self) -> &[Argument] {
            &self.provides
        }
        fn is_background(&self) -> bool {
            self.background
        }
    }

    fn missing(name: &str, argument: &Argument) -> PipelineError {
        PipelineError::NoStepProvider {
            step: name.to_string(),
            argument: argument.clone(),
        }
    }

    #[test]
    fn test_second_provider_is_ambiguous_and_leaves_index_untouched() {
        let x = Argument::string("x");
        let y = Argument::string("y");
        let mut index = ProviderIndex::default();
        index.register(&Item::new(1, vec![], vec![x.clone()])).unwrap();

        let err = index
            .register(&Item::new(2, vec![], vec![y.clone(), x.clone()]))
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::AmbiguousProvider {
                argument: x,
                existing: 1,
                duplicate: 2
            }
        );
        assert_eq!(index.provider(&y), None);
        assert_eq!(index.root(), &[1]);
    }

    #[test]
    fn test_root_arguments_do_not_override_providers() {
        let x = Argument::string("x");
        let env = Argument::string("env");
        let mut index = ProviderIndex::default();
        index.register(&Item::new(3, vec![], vec![x.clone()])).unwrap();

        let items = vec![Item::new(4, vec![x.clone(), env.clone()], vec![])];
        let edges = index
            .resolve(items.iter(), &[x.clone(), env.clone()], &[], missing)
            .unwrap();
        assert_eq!(edges, vec![(3, 4), (ROOT_ID, 4)]);
        assert_eq!(index.provider(&x), Some(3));
        assert_eq!(index.provider(&env), None);
    }

    #[test]
    fn test_root_arguments_apply_to_one_resolve_only() {
        let env = Argument::string("env");
        let index = ProviderIndex::default();
        let items = vec![Item::new(1, vec![env.clone()], vec![])];

        index.resolve(items.iter(), &[env.clone()], &[], missing).unwrap();
        let err = index.resolve(items.iter(), &[], &[], missing).unwrap_err();
        assert_eq!(err, missing("item", &env));
    }

    #[test]
    fn test_resolve_fallbacks() {
        let token = Argument::secret("token");
        let upstream = Argument::string("upstream");
        let unknown = Argument::string("unknown");
        let index = ProviderIndex::default();

        let items = vec![Item::new(1, vec![token.clone(), upstream.clone()], vec![])];
        let edges = index
            .resolve(items.iter(), &[upstream.clone()], &[], missing)
            .unwrap();
        assert_eq!(edges, vec![(ROOT_ID, 1)]);

        let items = vec![Item::new(1, vec![unknown.clone()], vec![])];
        let err = index.resolve(items.iter(), &[], &[], missing).unwrap_err();
        assert_eq!(err, missing("item", &unknown));
    }

    #[test]
    fn test_secret_only_requirement_hangs_off_root() {
        let index = ProviderIndex::default();
        let items = vec![Item::new(4, vec![Argument::secret("token")], vec![])];
        let edges = index.resolve(items.iter(), &[], &[], missing).unwrap();
        assert_eq!(edges, vec![(ROOT_ID, 4)]);
    }

    #[test]
    fn test_background_items_ignore_requirements() {
        let mut index = ProviderIndex::default();
        let mut service = Item::new(5, vec![Argument::string("nowhere")], vec![Argument::string("db")]);
        service.background = true;
        index.register(&service).unwrap();

        assert_eq!(index.provider(&Argument::string("db")), None);
        let edges = index.resolve([&service], &[], &[], missing).unwrap();
        assert_eq!(edges, vec![(ROOT_ID, 5)]);
    }
}
