pub trait Stage {
    type Output: ?Sized;
    fn output(&self) -> &Self::Output;
}

pub trait AudioConsumer<T = f64>: Stage {
    fn consume(&mut self, data: &[T]);
    fn flush(&mut self);
}

pub trait FeatureVectorConsumer: Stage {
    fn consume(&mut self, features: &[f64]);
}
