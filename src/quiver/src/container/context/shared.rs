use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use oneshot::{Receiver, Sender};
use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::warn;

use crate::bean::{Bean, BeanId};
use crate::container::context::{ContextInstanceHandle, ContextState, InjectableContext};
use crate::container::injector::Creation;
use crate::container::{ContainerError, Instance};
use crate::scope::Scope;

/// A context which is always active and shares its instances across all
/// threads.
///
/// Each bean is constructed at most once: threads asking for a bean that is
/// being constructed by another thread wait for that construction to finish.
pub struct SharedContext {
    scope: Scope,
    managed: RwLock<SharedInstanceData>,
}

impl SharedContext {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            managed: RwLock::new(SharedInstanceData::new()),
        }
    }

    fn try_get_constructed_instance(&self, id: &BeanId) -> Option<Instance> {
        let objects = &self.managed.read().objects;
        objects.get(id).map(|handle| Arc::clone(handle.instance()))
    }

    fn get_or_construct(
        &self,
        bean: &Arc<Bean>,
        creation: &Creation<'_>,
    ) -> Result<Instance, ContainerError> {
        let id = bean.id();
        let mut managed = self.managed.write();

        if let Some(handle) = managed.objects.get(id) {
            Ok(Arc::clone(handle.instance()))
        } else if let Some(context) = managed.constructing.get_mut(id) {
            if context.is_constructed_by_current_thread() {
                Err(self.stop_construction_on_cyclic_dependency(managed, id))
            } else {
                let (sender, receiver) = oneshot::channel();
                context.register_waiter(sender);
                drop(managed);
                self.get_instance_on_response(receiver)
            }
        } else {
            self.construct_instance(managed, bean, creation)
        }
    }

    fn stop_construction_on_cyclic_dependency(
        &self,
        managed: RwLockWriteGuard<SharedInstanceData>,
        id: &BeanId,
    ) -> ContainerError {
        let err = ContainerError::CyclicDependency { bean: id.clone() };
        let response = WaitResponse::Error(err.clone());
        self.notify_waiters(managed, id, response);
        err
    }

    fn get_instance_on_response(
        &self,
        receiver: Receiver<WaitResponse>,
    ) -> Result<Instance, ContainerError> {
        match receiver.recv() {
            Ok(WaitResponse::Constructed(instance)) => Ok(instance),
            Ok(WaitResponse::Error(err)) => Err(err),
            Err(_) => unreachable!("the constructing thread should send a message"),
        }
    }

    fn construct_instance(
        &self,
        mut managed: RwLockWriteGuard<SharedInstanceData>,
        bean: &Arc<Bean>,
        creation: &Creation<'_>,
    ) -> Result<Instance, ContainerError> {
        let id = bean.id();
        let on_thread = thread::current().id();
        managed
            .constructing
            .insert(id.clone(), ConstructingInstanceContext::new(on_thread));
        drop(managed);

        match bean.create(creation) {
            Ok(instance) => {
                let handle = ContextInstanceHandle::new(
                    Arc::clone(bean),
                    Arc::clone(&instance),
                    Arc::clone(creation.creational_context()),
                );
                let mut managed = self.managed.write();
                managed.objects.insert(id.clone(), handle);
                let response = WaitResponse::Constructed(Arc::clone(&instance));
                self.notify_waiters(managed, id, response);
                Ok(instance)
            }
            Err(err) => {
                let managed = self.managed.write();
                self.notify_waiters(managed, id, WaitResponse::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn notify_waiters(
        &self,
        mut managed: RwLockWriteGuard<SharedInstanceData>,
        id: &BeanId,
        response: WaitResponse,
    ) {
        if let Some(context) = managed.constructing.remove(id) {
            drop(managed);
            context.notify(response);
        }
    }
}

impl InjectableContext for SharedContext {
    fn scope(&self) -> Scope {
        self.scope
    }

    fn is_active(&self) -> bool {
        true
    }

    fn get(
        &self,
        bean: &Arc<Bean>,
        creation: Option<&Creation<'_>>,
    ) -> Result<Option<Instance>, ContainerError> {
        if let Some(instance) = self.try_get_constructed_instance(bean.id()) {
            return Ok(Some(instance));
        }
        match creation {
            Some(creation) => self.get_or_construct(bean, creation).map(Some),
            None => Ok(None),
        }
    }

    fn get_handle(&self, bean: &Bean) -> Result<Option<ContextInstanceHandle>, ContainerError> {
        Ok(self.managed.read().objects.get(bean.id()).cloned())
    }

    fn state(&self) -> Result<ContextState, ContainerError> {
        let objects = &self.managed.read().objects;
        Ok(ContextState::from_handles(objects.values().cloned()))
    }

    fn destroy_bean(&self, bean: &Bean) -> Result<(), ContainerError> {
        let removed = self.managed.write().objects.remove(bean.id());
        match removed {
            Some(handle) => handle.destroy(),
            None => Ok(()),
        }
    }

    fn destroy(&self) -> Result<(), ContainerError> {
        let objects = mem::take(&mut self.managed.write().objects);
        let mut errors = Vec::new();
        for (id, handle) in objects {
            if let Err(err) = handle.destroy() {
                warn!(bean = %id, scope = %self.scope, error = %err, "failed to destroy an instance");
                errors.push(err);
            }
        }
        ContainerError::aggregate(errors)
    }
}

struct SharedInstanceData {
    objects: HashMap<BeanId, ContextInstanceHandle>,
    constructing: HashMap<BeanId, ConstructingInstanceContext>,
}

impl SharedInstanceData {
    fn new() -> Self {
        Self {
            objects: HashMap::new(),
            constructing: HashMap::new(),
        }
    }
}

struct ConstructingInstanceContext {
    on_thread: ThreadId,
    waiters: Vec<Sender<WaitResponse>>,
}

impl ConstructingInstanceContext {
    fn new(on_thread: ThreadId) -> Self {
        Self {
            on_thread,
            waiters: Vec::new(),
        }
    }

    fn is_constructed_by_current_thread(&self) -> bool {
        thread::current().id() == self.on_thread
    }

    fn register_waiter(&mut self, sender: Sender<WaitResponse>) {
        self.waiters.push(sender);
    }

    fn notify(self, response: WaitResponse) {
        for sender in self.waiters {
            let _ = sender.send(response.clone());
        }
    }
}

#[derive(Clone)]
enum WaitResponse {
    Constructed(Instance),
    Error(ContainerError),
}
