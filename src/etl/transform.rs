//! Transformer trait for item transformation

use eyre::Result;

/// Transformer trait for transforming items
///
/// Implementors define how to transform items:
/// - Type coercion against the schema
/// - Cleanup of model noise
/// - Length clamping
///
/// # Example
/// ```no_run
/// use formfill::etl::Transformer;
/// use eyre::Result;
///
/// struct Uppercase;
///
/// impl Transformer for Uppercase {
///     type Input = String;
///     type Output = String;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         Ok(input.to_uppercase())
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if transformation fails (validation, conversion, etc.)
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Transform multiple items (default batch implementation)
    ///
    /// Override this for optimized batch processing
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }

    /// Feed the output of this transformer into `next`
    fn then<N>(self, next: N) -> Chained<Self, N>
    where
        Self: Sized,
        N: Transformer<Input = Self::Output>,
    {
        Chained { first: self, next }
    }
}

/// Two transformers applied in sequence, see [`Transformer::then`]
pub struct Chained<A, B> {
    first: A,
    next: B,
}

impl<A, B> Transformer for Chained<A, B>
where
    A: Transformer,
    B: Transformer<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        self.next.transform(self.first.transform(input)?)
    }
}

/// Identity transformer that passes items through unchanged
///
/// Use this when you need a transformer but don't want to modify the data.
/// The generic parameter T must be specified when creating the transformer.
pub struct IdentityTransformer<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for IdentityTransformer<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> IdentityTransformer<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send + Sync> Transformer for IdentityTransformer<T> {
    type Input = T;
    type Output = T;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AddOne;

    impl Transformer for AddOne {
        type Input = i32;
        type Output = i32;
        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            Ok(input + 1)
        }
    }

    struct Stringify;

    impl Transformer for Stringify {
        type Input = i32;
        type Output = String;
        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            Ok(input.to_string())
        }
    }

    #[test]
    fn test_identity_transformer() {
        let transformer = IdentityTransformer::<i32>::new();
        let input = vec![1, 2, 3];
        let output = transformer.transform_many(input.clone()).unwrap();
        assert_eq!(input, output);
    }

    #[test]
    fn test_chained_transformers() {
        let chain = AddOne.then(AddOne).then(Stringify);
        let output = chain.transform_many(vec![1, 40]).unwrap();
        assert_eq!(output, vec!["3".to_string(), "42".to_string()]);
    }
}
