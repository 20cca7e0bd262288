//! Macros for reducing boilerplate when defining entities

/// Implement [`Entity`](crate::core::Entity) and [`IdCodec`](crate::core::IdCodec)
/// for a struct with a scalar id
///
/// The struct needs an id field whose type implements `FromStr`, and a
/// `deletable: Deletable` field.
///
/// # Example
/// ```rust,ignore
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// pub struct Author {
///     pub id: i64,
///     pub name: String,
///     #[serde(flatten)]
///     pub deletable: Deletable,
/// }
///
/// impl_entity!(Author, "author", id: i64);
/// ```
#[macro_export]
macro_rules! impl_entity {
    ($type:ty, $entity_type:expr, $id_field:ident : $id_type:ty) => {
        impl $crate::core::entity::Entity for $type {
            type Id = $id_type;

            fn entity_type() -> &'static str {
                $entity_type
            }

            fn id(&self) -> Self::Id {
                ::std::clone::Clone::clone(&self.$id_field)
            }

            fn deletable(&self) -> &$crate::core::entity::Deletable {
                &self.deletable
            }

            fn deletable_mut(&mut self) -> &mut $crate::core::entity::Deletable {
                &mut self.deletable
            }
        }

        impl $crate::core::entity::IdCodec for $type {
            fn id_field_count() -> usize {
                1
            }

            fn parts_to_id(parts: &[&str]) -> $crate::prelude::Result<Self::Id> {
                $crate::core::entity::parse_id_part::<$id_type>(parts, 0)
            }
        }
    };
}

/// Implement [`Merge`](crate::core::Merge) by copying the listed fields from
/// the incoming value onto the stored one
///
/// # Example
/// ```rust,ignore
/// impl_merge!(Author, [name]);
/// ```
#[macro_export]
macro_rules! impl_merge {
    ($type:ty, [$($field:ident),* $(,)?]) => {
        impl $crate::core::entity::Merge for $type {
            #[allow(unused_mut, unused_variables)]
            fn merge(mut stored: Self, incoming: &Self) -> Self {
                $(
                    stored.$field = ::std::clone::Clone::clone(&incoming.$field);
                )*
                stored
            }
        }
    };
}
