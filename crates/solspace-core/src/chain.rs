//! Per-learner code chains and loop removal.
//!
//! A learner who reverts to an earlier state produces a loop
//! `T1 -> T2 -> T3 -> T1 -> T4`. Before a chain is folded into the graph
//! every loop is collapsed into its final occurrence: `T1 -> T4`.

use tracing::debug;

use crate::code::Code;
use crate::info::CodeInfo;

/// One element of a learner's time-ordered history.
pub type ChainLink = (Code, CodeInfo);

/// Collapses loops in place: for each position, everything from it up to
/// (excluding) the last later element with an equal key is removed.
pub fn collapse_loops<T, K, F>(items: &mut Vec<T>, key: F)
where
    K: PartialEq + ?Sized,
    F: Fn(&T) -> &K,
{
    let mut current = 0;
    while current < items.len() {
        let last_same = (current + 1..items.len())
            .rev()
            .find(|&next| key(&items[next]) == key(&items[current]));
        if let Some(last) = last_same {
            items.drain(current..last);
        }
        current += 1;
    }
}

/// Prepends `empty` (the empty program with the learner's code info) and
/// collapses loops by canonical-tree equality. Idempotent.
///
/// The prepended element makes a return to the empty program collapse the
/// whole prefix: `T1 -> T2 -> <empty> -> T5` becomes `<empty> -> T5`.
pub fn remove_loops(chain: Vec<ChainLink>, empty: ChainLink) -> Vec<ChainLink> {
    let before = chain.len();
    let mut links = Vec::with_capacity(before + 1);
    links.push(empty);
    links.extend(chain);
    collapse_loops(&mut links, |(code, _)| &code.canonical);
    debug!(before, after = links.len(), "removed loops from code info chain");
    links
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::code::{Language, CORRECT_CODE};
    use crate::info::User;
    use crate::tree::SyntaxTree;

    fn link(statement: &str) -> ChainLink {
        let children = if statement.is_empty() {
            vec![]
        } else {
            vec![SyntaxTree::leaf("stmt", statement)]
        };
        let tree = SyntaxTree::new("module").with_children(children);
        (
            Code::new(tree.clone(), tree, CORRECT_CODE, Language::Python).unwrap(),
            CodeInfo::new(User::new("u")),
        )
    }

    fn labels(chain: &[ChainLink]) -> Vec<String> {
        chain
            .iter()
            .map(|(code, _)| {
                code.canonical
                    .children
                    .first()
                    .and_then(|c| c.label.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn loop_collapses_into_last_occurrence() {
        let chain = Vec::from(["T1", "T2", "T3", "T1", "T4"].map(link));
        let result = remove_loops(chain, link(""));
        assert_eq!(labels(&result), vec!["", "T1", "T4"]);
    }

    #[test]
    fn chain_already_starting_with_empty_code() {
        let chain = Vec::from(["", "T1", "T2", "T3", "T1", "T4"].map(link));
        let result = remove_loops(chain, link(""));
        assert_eq!(labels(&result), vec!["", "T1", "T4"]);
    }

    #[test]
    fn return_to_empty_code_drops_the_prefix() {
        let chain = Vec::from(["T1", "T2", "T3", "", "T5"].map(link));
        let result = remove_loops(chain, link(""));
        assert_eq!(labels(&result), vec!["", "T5"]);
    }

    #[test]
    fn nested_loops() {
        let mut items = vec![1, 2, 3, 2, 4, 1, 5];
        collapse_loops(&mut items, |x| x);
        assert_eq!(items, vec![1, 5]);
    }

    proptest! {
        #[test]
        fn collapse_is_idempotent(items in proptest::collection::vec(0u8..6, 0..30)) {
            let mut once = items.clone();
            collapse_loops(&mut once, |x| x);
            let mut twice = once.clone();
            collapse_loops(&mut twice, |x| x);
            prop_assert_eq!(&once, &twice);

            let mut sorted = once.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), once.len());
        }

        #[test]
        fn remove_loops_is_idempotent(items in proptest::collection::vec(0u8..5, 0..20)) {
            let chain: Vec<ChainLink> = items.iter().map(|i| link(&format!("T{i}"))).collect();
            let once = remove_loops(chain, link(""));
            let twice = remove_loops(once.clone(), link(""));
            prop_assert_eq!(labels(&once), labels(&twice));
        }
    }
}
