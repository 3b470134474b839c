use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{VarBuilder, VarMap};
use latent_nets::candle_gaussian_head::{ConstantGaussian, GaussianHead};
use latent_nets::candle_latent_network::{LatentConfig, LatentNetwork};
use latent_nets::candle_model_traits::EncoderModuleT;
use latent_nets::candle_task_network::{TaskConfig, TaskNetwork};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn small_latent_config() -> LatentConfig {
    LatentConfig {
        observation_channels: 3,
        image_size: 16,
        latent_dim: 8,
        hidden_units: vec![16, 16],
        leaky_slope: 0.2,
        decoder_std: 0.1_f64.sqrt(),
    }
}

fn weights(varmap: &VarMap, name: &str) -> Result<Vec<f32>> {
    let data = varmap.data().lock().unwrap();
    data[name].as_tensor().flatten_all()?.to_vec1::<f32>()
}

#[test]
fn latent_network_round_trip_shapes() -> Result<()> {
    let dev = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

    let net = LatentNetwork::new(&small_latent_config(), vb.pp("latent"))?;
    let mut rng = StdRng::seed_from_u64(1);
    net.init_weights(&varmap, &mut rng)?;

    let x = Tensor::randn(0f32, 1f32, (3, 3, 16, 16), &dev)?.tanh()?;
    let (z_mean, q_z) = net.encode(&x)?;
    assert_eq!(z_mean.dims(), &[3, 8]);

    let z = q_z.rsample()?;
    let p_x = net.decode(&z)?;
    assert_eq!(p_x.loc().dims(), x.dims());

    // observation model of the latent network
    let s = p_x.scale().flatten_all()?.to_vec1::<f32>()?;
    approx::assert_abs_diff_eq!(s[0], 0.1_f32.sqrt(), epsilon = 1e-6);

    let log_px = p_x.log_prob(&x)?.sum_all()?.to_scalar::<f32>()?;
    assert!(log_px.is_finite());

    let kl = q_z
        .kl_divergence(&ConstantGaussian::new(8, 1.0)?.forward(&z)?)?
        .sum_all()?
        .to_scalar::<f32>()?;
    assert!(kl >= 0.0);

    assert_eq!(net.reconstruct(&x)?.dims(), x.dims());
    Ok(())
}

#[test]
fn default_latent_network_forward() -> Result<()> {
    let dev = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

    let config = LatentConfig::default();
    let net = LatentNetwork::new(&config, vb)?;
    net.init_weights(&varmap, &mut StdRng::seed_from_u64(0))?;

    // the first transposed kernel spans the whole 27 x 27 trunk
    let kernel = varmap.data().lock().unwrap()["decoder.convt.0.weight"]
        .as_tensor()
        .dims()
        .to_vec();
    assert_eq!(kernel, vec![256, 64, 27, 27]);

    let x = Tensor::zeros((1, 3, 216, 216), DType::F32, &dev)?;
    let (z_mean, q_z) = net.encode(&x)?;
    assert_eq!(z_mean.dims(), &[1, 256]);

    let p_x = net.decode(&q_z.rsample()?)?;
    assert_eq!(p_x.loc().dims(), &[1, 3, 216, 216]);

    let loc = p_x.loc().flatten_all()?.to_vec1::<f32>()?;
    assert!(loc.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
    Ok(())
}

#[test]
fn orthogonal_init_is_seeded() -> Result<()> {
    let dev = Device::Cpu;
    let config = small_latent_config();

    let build = |seed: u64| -> Result<VarMap> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        let net = LatentNetwork::new(&config, vb)?;
        net.init_weights(&varmap, &mut StdRng::seed_from_u64(seed))?;
        Ok(varmap)
    };

    let a = build(5)?;
    let b = build(5)?;
    let c = build(6)?;

    let name = "encoder.gaussian.fc.0.weight";
    assert_eq!(weights(&a, name)?, weights(&b, name)?);
    assert_ne!(weights(&a, name)?, weights(&c, name)?);

    // biases zeroed, transposed convolutions delta-orthogonal
    assert!(weights(&a, "decoder.convt.1.bias")?.iter().all(|&x| x == 0.0));

    let w = weights(&a, "decoder.convt.1.weight")?;
    let (kk, mid) = (3, 1);
    for (i, x) in w.iter().enumerate() {
        let (r, c) = ((i / kk) % kk, i % kk);
        if r != mid || c != mid {
            assert_eq!(*x, 0.0);
        }
    }
    Ok(())
}

#[test]
fn encoder_features_feed_task_network() -> Result<()> {
    let dev = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

    let config = small_latent_config();
    let net = LatentNetwork::new(&config, vb.pp("latent"))?;

    let task = TaskNetwork::new(
        TaskConfig {
            input_dim: config.latent_dim + 2,
            output_dim: 16,
            hidden_units: vec![32],
            ..Default::default()
        },
        vb.pp("task"),
    )?;

    let x = Tensor::zeros((2, 3, 16, 16), DType::F32, &dev)?;
    let (z, _) = net.encoder.forward_dist(&x)?;
    let task_id = Tensor::new(&[[1f32, 0.0], [0.0, 1.0]], &dev)?;

    let film = task.forward_cat(&[&z, &task_id])?;
    assert_eq!(film.gamma.dims(), &[2, 16]);

    let h = Tensor::ones((2, 16), DType::F32, &dev)?;
    assert_eq!(film.modulate(&h)?.dims(), &[2, 16]);
    Ok(())
}

#[test]
fn auxiliary_gaussian_heads() -> Result<()> {
    let dev = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

    let prior = GaussianHead::new(8 + 2, 8, &[16], None, 0.2, vb.pp("prior"))?;
    let z = Tensor::randn(0f32, 1f32, (4, 8), &dev)?;
    let a = Tensor::randn(0f32, 1f32, (4, 2), &dev)?;

    let p = prior.forward_cat(&[&z, &a])?;
    assert_eq!(p.dims(), &[4, 8]);
    assert_eq!(p.entropy()?.dims(), &[4, 8]);

    let z_next = p.sample()?;
    assert!(p.log_prob(&z_next)?.sum_all()?.to_scalar::<f32>()?.is_finite());
    Ok(())
}
