//! Scenes on the host.

pub use super::*;
pub use burn::tensor::Tensor;

/// A scene observed from `V` views, on the host.
///
/// The fields have the shapes of [`SceneBatch`] without the leading `S`.
#[derive(Clone, Debug)]
pub struct SceneItem {
    /// `[V, 3]`
    pub camera_centers: TensorData,
    /// `[V, 2]`
    pub focals_pixels: Option<TensorData>,
    /// `[V, 4, 4]`
    pub full_proj_transforms: TensorData,
    /// `[V, 3, H, W]`
    pub gt_images: TensorData,
    /// `[V, 1, H, W]`
    pub origin_distances: Option<TensorData>,
    /// `[V, 4]`
    pub source_cv2wt_quats: TensorData,
    /// `[V, 4, 4]`
    pub view_to_world_transforms: TensorData,
    /// `[V, 4, 4]`
    pub world_view_transforms: TensorData,
}

impl<B: Backend> SceneBatch<B> {
    /// Stacking the items along a new scene dimension.
    ///
    /// The optional fields must be present in all items or in none of them.
    pub fn from_items(
        items: Vec<SceneItem>,
        device: &B::Device,
    ) -> Result<Self, Error> {
        if items.is_empty() {
            return Err(Error::Dataset("The batch has no item".into()));
        }

        let mut camera_centers = Vec::with_capacity(items.len());
        let mut focals_pixels = Vec::with_capacity(items.len());
        let mut full_proj_transforms = Vec::with_capacity(items.len());
        let mut gt_images = Vec::with_capacity(items.len());
        let mut origin_distances = Vec::with_capacity(items.len());
        let mut source_cv2wt_quats = Vec::with_capacity(items.len());
        let mut view_to_world_transforms = Vec::with_capacity(items.len());
        let mut world_view_transforms = Vec::with_capacity(items.len());

        for item in items {
            camera_centers.push(item.camera_centers);
            focals_pixels.push(item.focals_pixels);
            full_proj_transforms.push(item.full_proj_transforms);
            gt_images.push(item.gt_images);
            origin_distances.push(item.origin_distances);
            source_cv2wt_quats.push(item.source_cv2wt_quats);
            view_to_world_transforms.push(item.view_to_world_transforms);
            world_view_transforms.push(item.world_view_transforms);
        }

        let batch = Self {
            camera_centers: stack::<B, 2, 3>("camera_centers", camera_centers, device)?,
            focals_pixels: transpose("focals_pixels", focals_pixels)?
                .map(|data| stack::<B, 2, 3>("focals_pixels", data, device))
                .transpose()?,
            full_proj_transforms: stack::<B, 3, 4>(
                "full_proj_transforms",
                full_proj_transforms,
                device,
            )?,
            gt_images: stack::<B, 4, 5>("gt_images", gt_images, device)?,
            origin_distances: transpose("origin_distances", origin_distances)?
                .map(|data| stack::<B, 4, 5>("origin_distances", data, device))
                .transpose()?,
            source_cv2wt_quats: stack::<B, 2, 3>(
                "source_cv2wt_quats",
                source_cv2wt_quats,
                device,
            )?,
            view_to_world_transforms: stack::<B, 3, 4>(
                "view_to_world_transforms",
                view_to_world_transforms,
                device,
            )?,
            world_view_transforms: stack::<B, 3, 4>(
                "world_view_transforms",
                world_view_transforms,
                device,
            )?,
        };
        batch.validate()?;

        Ok(batch)
    }
}

/// All or none.
fn transpose(
    name: &str,
    data: Vec<Option<TensorData>>,
) -> Result<Option<Vec<TensorData>>, Error> {
    let present_count = data.iter().filter(|data| data.is_some()).count();
    match present_count {
        0 => Ok(None),
        count if count == data.len() => Ok(data.into_iter().collect()),
        count => Err(Error::Dataset(format!(
            "The field {name} is present in {count} of {} items",
            data.len()
        ))),
    }
}

fn stack<B: Backend, const D: usize, const D2: usize>(
    name: &str,
    data: Vec<TensorData>,
    device: &B::Device,
) -> Result<Tensor<B, D2>, Error> {
    let shape = data.first().map(|data| data.shape.to_owned()).unwrap_or_default();
    if shape.len() != D {
        return Err(Error::Validation(
            format!("The rank of {name} ({})", shape.len()),
            format!("{D}"),
        ));
    }
    if let Some(other) = data.iter().find(|data| data.shape != shape) {
        return Err(Error::Validation(
            format!("The shape of {name} ({:?})", other.shape),
            format!("{shape:?}"),
        ));
    }

    let tensors = data
        .into_iter()
        .map(|data| Tensor::<B, D>::from_data(data.convert::<f32>(), device))
        .collect();

    Ok(Tensor::stack(tensors, 0))
}
