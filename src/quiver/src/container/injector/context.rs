use crate::bean::BeanId;

/// The chain of beans being created on the current call stack.
#[derive(Clone)]
pub struct CallContext<'a> {
    trace: InjectionTrace<'a>,
}

impl<'a> CallContext<'a> {
    pub fn new(bean: &'a BeanId) -> Self {
        Self {
            trace: InjectionTrace::new(bean),
        }
    }

    pub fn append<'b>(&'b self, bean: &'b BeanId) -> CallContext<'b> {
        CallContext {
            trace: self.trace.append(bean),
        }
    }

    pub fn bean(&self) -> &BeanId {
        self.trace.bean()
    }

    pub fn trace(&self) -> &InjectionTrace<'_> {
        &self.trace
    }
}

#[derive(Clone)]
pub struct InjectionTrace<'a> {
    bean: &'a BeanId,
    previous: Option<&'a InjectionTrace<'a>>,
}

impl<'a> InjectionTrace<'a> {
    pub fn new(bean: &'a BeanId) -> Self {
        Self {
            bean,
            previous: None,
        }
    }

    pub fn append<'b>(&'b self, bean: &'b BeanId) -> InjectionTrace<'b> {
        InjectionTrace {
            bean,
            previous: Some(self),
        }
    }

    pub fn bean(&self) -> &BeanId {
        self.bean
    }

    pub fn previous(&self) -> Option<&InjectionTrace<'a>> {
        self.previous
    }

    /// Returns true if `bean` is somewhere in the trace, including its head.
    pub fn contains(&self, bean: &BeanId) -> bool {
        let mut this = Some(self);
        while let Some(trace) = this {
            if trace.bean() == bean {
                return true;
            }
            this = trace.previous();
        }
        false
    }
}
