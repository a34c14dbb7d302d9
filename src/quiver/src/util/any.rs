use std::any::{self, Any};
use std::ops::Deref;
use std::sync::Arc;

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

/// Upcasting of shared trait objects into `Arc<dyn Any>`.
pub trait AsAnyArc: AsAny + Send + Sync {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    #[inline]
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub trait DowncastRef {
    fn is<T: Any>(&self) -> bool;

    fn downcast_ref<T: Any>(&self) -> Option<&T>;
}

impl<S> DowncastRef for S
where
    S: Deref<Target: AsAny>,
{
    #[inline]
    fn is<T: Any>(&self) -> bool {
        (**self).as_any().is::<T>()
    }

    #[inline]
    fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (**self).as_any().downcast_ref::<T>()
    }
}

pub trait Downcast: DowncastRef + Sized {
    type Output<T>;

    fn downcast<T: Any + Send + Sync>(self) -> Result<Self::Output<T>, Self>;
}

impl<S> Downcast for Arc<S>
where
    S: AsAnyArc + ?Sized,
{
    type Output<T> = Arc<T>;

    fn downcast<T: Any + Send + Sync>(self) -> Result<Self::Output<T>, Self> {
        if self.is::<T>() {
            let res = AsAnyArc::into_any_arc(self)
                .downcast::<T>()
                .unwrap_or_else(|_| std::unreachable!("`self` should be `Arc<T>`"));
            Ok(res)
        } else {
            Err(self)
        }
    }
}
