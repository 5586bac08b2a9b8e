use super::newtypes::Uid;
use std::collections::HashSet;

/// Fixed set of accounts with elevated privileges for every gated feature. Built once at
/// startup and never modified afterwards.
#[derive(Clone, Debug, Default)]
pub struct DeveloperAllowlist(HashSet<Uid>);

impl DeveloperAllowlist {
    pub fn new<I, T>(uids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Uid>,
    {
        DeveloperAllowlist(uids.into_iter().map(Into::into).collect())
    }

    pub fn with(mut self, uid: Uid) -> Self {
        self.0.insert(uid);
        self
    }

    pub fn contains(&self, uid: &Uid) -> bool {
        self.0.contains(uid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Anything with a recorded owner, for use with [can_edit].
pub trait Owned {
    fn owner(&self) -> &Uid;
}

/// Single permission check for all edit flows. Access is granted if the caller owns the
/// resource, is on the developer allowlist, or is separately flagged as verified.
///
/// `is_verified` usually requires a database read, so it is only called if the first two
/// checks fail.
pub fn can_edit<R, F>(uid: &Uid, resource: &R, developers: &DeveloperAllowlist, is_verified: F) -> bool
where
    R: Owned + ?Sized,
    F: FnOnce(&Uid) -> bool,
{
    uid == resource.owner() || developers.contains(uid) || is_verified(uid)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;

    struct Doc(Uid);

    impl Owned for Doc {
        fn owner(&self) -> &Uid {
            &self.0
        }
    }

    #[test]
    fn test_can_edit_all_combinations() {
        let caller = Uid::from("caller");
        for is_owner in [false, true] {
            for is_dev in [false, true] {
                for verified in [false, true] {
                    let doc = if is_owner {
                        Doc(caller.clone())
                    } else {
                        Doc(Uid::from("someone_else"))
                    };
                    let developers = if is_dev {
                        DeveloperAllowlist::new(["caller"])
                    } else {
                        DeveloperAllowlist::new(["other_dev"])
                    };
                    let expected = is_owner || is_dev || verified;
                    let actual = can_edit(&caller, &doc, &developers, |_| verified);
                    assert_eq!(
                        expected, actual,
                        "owner={is_owner} dev={is_dev} verified={verified}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_verified_lookup_skipped_for_owner() {
        let caller = Uid::from("caller");
        let lookups = Cell::new(0);
        let allowed = can_edit(
            &caller,
            &Doc(caller.clone()),
            &DeveloperAllowlist::default(),
            |_| {
                lookups.set(lookups.get() + 1);
                false
            },
        );
        assert!(allowed);
        assert_eq!(0, lookups.get());
    }
}
