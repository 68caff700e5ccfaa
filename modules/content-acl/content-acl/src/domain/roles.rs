//! Depth-first walk over active roles and their inheritance chains.

use content_acl_sdk::{AclError, AclSchema, RoleDefinition};

/// A role reached by [`walk_roles`].
#[derive(Clone, Copy, Debug)]
pub struct RoleVisit<'s> {
    pub name: &'s str,
    pub definition: &'s RoleDefinition,
    /// Active role whose membership this visit belongs to; `name` itself
    /// for active roles.
    pub member: &'s str,
    /// Variable prefix in effect for this role.
    pub prefix: &'s str,
}

/// Visit `roles` in order, each followed by its inherited roles.
///
/// The prefix of a role is `prefix` if given, else its declared variable
/// prefix, else its own name. Inherited roles use the prefix of the role
/// that pulled them in. Undeclared active roles are skipped.
///
/// # Errors
/// - [`AclError::UndeclaredInheritedRole`] for an undeclared inherited role
/// - [`AclError::CyclicInheritance`] if a role inherits itself
/// - any error returned by `visit`
pub fn walk_roles<'s, F>(
    acl: &'s AclSchema,
    roles: &'s [String],
    prefix: Option<&'s str>,
    visit: &mut F,
) -> Result<(), AclError>
where
    F: FnMut(RoleVisit<'s>) -> Result<(), AclError>,
{
    let mut chain = Vec::new();
    walk(acl, roles, prefix, &mut chain, visit)
}

fn walk<'s, F>(
    acl: &'s AclSchema,
    roles: &'s [String],
    prefix: Option<&'s str>,
    chain: &mut Vec<&'s str>,
    visit: &mut F,
) -> Result<(), AclError>
where
    F: FnMut(RoleVisit<'s>) -> Result<(), AclError>,
{
    for role in roles {
        let name = role.as_str();
        let Some(definition) = acl.roles.get(name) else {
            if let Some(parent) = chain.last() {
                return Err(AclError::UndeclaredInheritedRole {
                    role: (*parent).to_owned(),
                    inherited: name.to_owned(),
                });
            }
            tracing::debug!(role = %name, "Active role is not declared, it grants nothing");
            continue;
        };
        if chain.contains(&name) {
            let mut cycle = chain.clone();
            cycle.push(name);
            return Err(AclError::CyclicInheritance {
                chain: cycle.join(" -> "),
            });
        }

        let role_prefix = prefix
            .or(definition.variable_prefix.as_deref())
            .unwrap_or(name);
        visit(RoleVisit {
            name,
            definition,
            member: chain.first().copied().unwrap_or(name),
            prefix: role_prefix,
        })?;

        if !definition.inherits.is_empty() {
            chain.push(name);
            let inherited = walk(acl, &definition.inherits, Some(role_prefix), chain, visit);
            chain.pop();
            inherited?;
        }
    }
    Ok(())
}
